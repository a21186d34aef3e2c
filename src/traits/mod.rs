pub mod hooks;
pub mod interpreter;

pub use hooks::Hooks;
pub use interpreter::Interpreter;
