pub const MESSAGES_RECEIVED: &str = "intake_messages_received";
pub const MESSAGE_OUTCOMES: &str = "intake_message_outcomes";
pub const MESSAGE_PROCESSING_TIME: &str = "intake_message_processing_seconds";
pub const DEPENDENCY_CALL_TIME: &str = "intake_dependency_call_seconds";
pub const RECEIPTS_SENT: &str = "intake_receipts_sent";
pub const NOTIFICATIONS_SENT: &str = "intake_case_notifications_sent";
pub const DUPLICATES_DROPPED: &str = "intake_duplicate_messages";
pub const DEDUP_STORE_ERRORS: &str = "intake_dedup_store_errors";
pub const MANUAL_TASKS_CREATED: &str = "intake_manual_tasks_created";
pub const DEAD_LETTERS: &str = "intake_dead_lettered_messages";
pub const DEAD_LETTER_FAILURES: &str = "intake_dead_letter_failures";
pub const RECEIVE_ERRORS: &str = "intake_receive_errors";
