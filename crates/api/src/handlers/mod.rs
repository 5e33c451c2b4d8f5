pub mod diagnostics;
pub mod entities;
pub mod evaluation;
pub mod events;
pub mod maintenance;
pub mod mode;
pub mod settings;
