mod add;
mod complete;
mod delete;
mod list;
mod update;
mod util;

use std::sync::Arc;

use pmcp::ServerBuilder;
use taskflow_core::services::TasksService;

pub const TOOL_NAMES: &[&str] = &[
    "add_task",
    "list_tasks",
    "complete_task",
    "delete_task",
    "update_task",
];

pub fn register(builder: ServerBuilder, service: Arc<TasksService>) -> ServerBuilder {
    builder
        .tool("add_task", add::AddTaskTool::new(service.clone()))
        .tool("list_tasks", list::ListTasksTool::new(service.clone()))
        .tool(
            "complete_task",
            complete::CompleteTaskTool::new(service.clone()),
        )
        .tool("delete_task", delete::DeleteTaskTool::new(service.clone()))
        .tool("update_task", update::UpdateTaskTool::new(service))
}
