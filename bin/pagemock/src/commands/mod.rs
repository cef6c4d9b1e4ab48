pub mod completions_cmd;
pub mod run_cmd;
pub mod tools_cmd;
