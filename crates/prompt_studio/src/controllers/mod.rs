pub mod document_controller;
mod multipart;
pub mod profile_controller;
pub mod tool_controller;
pub mod transfer_controller;
