pub mod server;

use std::path::PathBuf;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        private_key: PathBuf,
        public_key: PathBuf,
        fts_dir: PathBuf,
        send_system_data: bool,
    },
}
