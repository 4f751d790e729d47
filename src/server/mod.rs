// 服务器模块入口
// 提供监听器创建、连接处理和优雅停机

pub mod connection;
pub mod listener;
pub mod signal;

// Rust 不允许 loop 作为模块名（关键字），改用 server_loop
#[path = "loop.rs"]
pub mod server_loop;

// 重新导出常用类型
pub use listener::create_listener;
pub use server_loop::run_server_loop;
pub use signal::start_signal_handler;
