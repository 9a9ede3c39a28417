use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("nectar-server")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("NECTAR_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("NECTAR_DSN")
                .required(true),
        )
        .arg(
            Arg::new("server-private-key")
                .long("server-private-key")
                .help("Path to the server ES384 private key (PEM)")
                .env("NECTAR_SERVER_PRIVATE_KEY")
                .required(true),
        )
        .arg(
            Arg::new("server-public-key")
                .long("server-public-key")
                .help("Path to the server ES384 public key (PEM)")
                .env("NECTAR_SERVER_PUBLIC_KEY")
                .required(true),
        )
        .arg(
            Arg::new("fts-dir")
                .long("fts-dir")
                .help("Root directory of the file transfer system")
                .default_value("fts")
                .env("NECTAR_FTS_DIR"),
        )
        .arg(
            Arg::new("send-system-data")
                .long("send-system-data")
                .help("Include host platform details in the info endpoint")
                .env("NECTAR_SEND_SYSTEM_DATA")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("NECTAR_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
