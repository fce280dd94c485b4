mod tasks;

pub use tasks::{TaskChange, TasksService, ViewSnapshot};
