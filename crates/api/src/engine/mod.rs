//! Manager-side engines that do work outside the request cycle.

pub mod assembler;
