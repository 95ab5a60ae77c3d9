pub mod common;

mod entry_store_tests;
mod task_queue_tests;
