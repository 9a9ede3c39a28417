use crate::cli::actions::Action;
use anyhow::Result;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let path_arg = |name: &str| -> Result<PathBuf> {
        matches
            .get_one::<String>(name)
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{name}"))
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        private_key: path_arg("server-private-key")?,
        public_key: path_arg("server-public-key")?,
        fts_dir: path_arg("fts-dir")?,
        send_system_data: matches.get_flag("send-system-data"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn maps_matches_to_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from([
            "nectar-server",
            "--dsn",
            "postgres://localhost:5432/nectar",
            "--server-private-key",
            "keys/server.pem",
            "--server-public-key",
            "keys/server-pub.pem",
            "--send-system-data",
        ]);

        let Action::Server {
            port,
            dsn,
            private_key,
            public_key,
            fts_dir,
            send_system_data,
        } = handler(&matches)?;

        assert_eq!(port, 8080);
        assert_eq!(dsn, "postgres://localhost:5432/nectar");
        assert_eq!(private_key, PathBuf::from("keys/server.pem"));
        assert_eq!(public_key, PathBuf::from("keys/server-pub.pem"));
        assert_eq!(fts_dir, PathBuf::from("fts"));
        assert!(send_system_data);
        Ok(())
    }
}
