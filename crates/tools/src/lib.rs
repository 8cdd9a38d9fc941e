mod backend;
pub mod desktop_tools;
pub mod file_tools;
pub mod memory_tools;
pub mod process_tools;
pub mod reasoning_tools;
pub mod registry;
pub mod traits;

pub use registry::{Observation, ToolRegistry};
pub use traits::{Tool, ToolError};

use deskpilot_memory::LongTermMemory;
use deskpilot_policy::PermissionEngine;
use std::sync::Arc;

/// Tools small local models can handle reliably.
pub const LOCAL_TOOL_NAMES: &[&str] = &[
    "list_directory",
    "execute_terminal_command",
    "read_file_content",
    "get_current_directory",
    "open_app",
    "open_url",
];

/// Every built-in tool.
pub fn standard_registry(
    permissions: Arc<PermissionEngine>,
    memory: Arc<LongTermMemory>,
) -> ToolRegistry {
    use desktop_tools::*;
    use file_tools::*;
    use memory_tools::*;
    use process_tools::*;
    use reasoning_tools::*;

    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(MoveMouseTool::new(permissions.clone())));
    registry.register(Arc::new(ClickMouseTool::new(permissions.clone())));
    registry.register(Arc::new(TypeTextTool::new(permissions.clone())));
    registry.register(Arc::new(PressKeyTool::new(permissions.clone())));
    registry.register(Arc::new(OpenAppTool::new(permissions.clone())));
    registry.register(Arc::new(OpenUrlTool::new(permissions.clone())));
    registry.register(Arc::new(TakeScreenshotTool));
    registry.register(Arc::new(GetScreenInfoTool));

    registry.register(Arc::new(SearchFileTool::new(permissions.clone())));
    registry.register(Arc::new(GetCurrentDirectoryTool));
    registry.register(Arc::new(ReadFileContentTool::new(permissions.clone())));
    registry.register(Arc::new(ListDirectoryTool::new(permissions.clone())));

    registry.register(Arc::new(ExecuteTerminalCommandTool::new(permissions.clone())));
    registry.register(Arc::new(CheckRunningAppsTool));
    registry.register(Arc::new(VerifyExpectationsTool::new(permissions)));

    registry.register(Arc::new(PlanTaskTool));
    registry.register(Arc::new(SelfCritiqueTool));
    registry.register(Arc::new(DebugLastErrorTool));

    registry.register(Arc::new(SaveToMemoryTool::new(memory.clone())));
    registry.register(Arc::new(RecallFromMemoryTool::new(memory.clone())));
    registry.register(Arc::new(ClearMemoryTool::new(memory)));

    registry
}
