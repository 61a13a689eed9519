use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pathstore",
    about = "pathstore: path-addressed JSON documents over HTTP and MQTT",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file; a missing file means defaults
    #[arg(long, global = true, default_value = "pathstore.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server and, if configured, the MQTT bridge
    Serve(ServeArgs),
    /// Write every stored document to a file tree
    Export(ExportArgs),
    /// Print the short code for a link id
    Encode(EncodeArgs),
    /// Print the link id behind a short code
    Decode(DecodeArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, env = "HTTP_BIND")]
    pub bind: Option<SocketAddr>,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    #[arg(long)]
    pub export_root: Option<PathBuf>,
    /// Broker address; setting it enables the bridge
    #[arg(long, env = "MQTT_SERVER")]
    pub mqtt_server: Option<String>,
    #[arg(long, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,
    #[arg(long, env = "MQTT_PASS", hide_env_values = true)]
    pub mqtt_pass: Option<String>,
    /// Never start the bridge, whatever the configuration says
    #[arg(long)]
    pub no_mqtt: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Target directory (defaults to `server.export_root`)
    pub root: Option<PathBuf>,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

#[derive(Args)]
pub struct EncodeArgs {
    #[arg(allow_negative_numbers = true)]
    pub id: i64,
}

#[derive(Args)]
pub struct DecodeArgs {
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["pathstore", "serve", "--bind", "0.0.0.0:9000", "--no-mqtt"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:9000".parse().unwrap()));
            assert!(args.no_mqtt);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["pathstore", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_export_root() {
        let cli = Cli::try_parse_from(["pathstore", "export", "/tmp/out"]).unwrap();
        if let Command::Export(args) = cli.command {
            assert_eq!(args.root, Some(PathBuf::from("/tmp/out")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_encode_decode() {
        let cli = Cli::try_parse_from(["pathstore", "encode", "61"]).unwrap();
        assert!(matches!(cli.command, Command::Encode(EncodeArgs { id: 61 })));

        let cli = Cli::try_parse_from(["pathstore", "encode", "-1"]).unwrap();
        assert!(matches!(cli.command, Command::Encode(EncodeArgs { id: -1 })));

        let cli = Cli::try_parse_from(["pathstore", "decode", "Class1"]).unwrap();
        if let Command::Decode(args) = cli.command {
            assert_eq!(args.code, "Class1");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["pathstore", "--verbose", "decode", "B"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("pathstore.toml"));

        let cli = Cli::try_parse_from(["pathstore", "decode", "B", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn subcommand_required() {
        assert!(Cli::try_parse_from(["pathstore"]).is_err());
    }
}
