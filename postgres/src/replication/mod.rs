mod slots;

pub use slots::{MAX_SLOT_NAME_LENGTH, ReplicationSlotNameError, validate_slot_name};
