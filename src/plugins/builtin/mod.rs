//! Handler kinds compiled into the server.

pub mod echo;
pub mod files;
pub mod hello;
pub mod static_files;

pub use echo::EchoPlugin;
pub use files::FilesPlugin;
pub use hello::HelloPlugin;
pub use static_files::StaticFiles;
