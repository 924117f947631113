//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and mirrors the
//! constants in `helios_core::state`.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Render job lifecycle status.
    JobStatus {
        Pending = 1,
        Decomposing = 2,
        Rendering = 3,
        Assembling = 4,
        Done = 5,
        Error = 6,
        Canceled = 7,
    }
}

define_status_enum! {
    /// Render task execution status.
    TaskStatus {
        Pending = 1,
        Claimed = 2,
        Rendering = 3,
        Done = 4,
        Error = 5,
    }
}

define_status_enum! {
    /// Worker node liveness status.
    WorkerStatus {
        Active = 1,
        Stale = 2,
        Offline = 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_core::state;

    #[test]
    fn job_status_ids_match_state_machine_constants() {
        assert_eq!(JobStatus::Pending.id(), state::job::PENDING);
        assert_eq!(JobStatus::Decomposing.id(), state::job::DECOMPOSING);
        assert_eq!(JobStatus::Rendering.id(), state::job::RENDERING);
        assert_eq!(JobStatus::Assembling.id(), state::job::ASSEMBLING);
        assert_eq!(JobStatus::Done.id(), state::job::DONE);
        assert_eq!(JobStatus::Error.id(), state::job::ERROR);
        assert_eq!(JobStatus::Canceled.id(), state::job::CANCELED);
    }

    #[test]
    fn task_status_ids_match_state_machine_constants() {
        assert_eq!(TaskStatus::Pending.id(), state::task::PENDING);
        assert_eq!(TaskStatus::Claimed.id(), state::task::CLAIMED);
        assert_eq!(TaskStatus::Rendering.id(), state::task::RENDERING);
        assert_eq!(TaskStatus::Done.id(), state::task::DONE);
        assert_eq!(TaskStatus::Error.id(), state::task::ERROR);
    }

    #[test]
    fn worker_status_ids_match_state_machine_constants() {
        assert_eq!(WorkerStatus::Active.id(), state::worker::ACTIVE);
        assert_eq!(WorkerStatus::Stale.id(), state::worker::STALE);
        assert_eq!(WorkerStatus::Offline.id(), state::worker::OFFLINE);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = TaskStatus::Claimed.into();
        assert_eq!(id, 2);
    }
}
