//! Manual flag parsing for the CLI front-end's minimum flag set. No
//! argument-parsing crate is pulled in for this — the flag set is small
//! and fixed.

#[derive(Debug, Clone, Default)]
pub struct Cli {
    pub config: Option<String>,
    pub device: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub receive_port: Option<u16>,
    pub sample_rate: Option<f64>,
    pub buffer_size: Option<u32>,
    pub auto_config: bool,
    pub debug: bool,
}

#[derive(Debug)]
pub struct CliError(pub String);

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Cli {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, CliError> {
        let mut cli = Cli::default();
        let mut args = args.into_iter().peekable();
        args.next(); // skip argv[0]

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => cli.config = Some(Self::require_value(&mut args, "--config")?),
                "--device" => cli.device = Some(Self::require_value(&mut args, "--device")?),
                "--ip" => cli.ip = Some(Self::require_value(&mut args, "--ip")?),
                "--port" => cli.port = Some(Self::parse_value(&mut args, "--port")?),
                "--receive-port" => cli.receive_port = Some(Self::parse_value(&mut args, "--receive-port")?),
                "--sample-rate" => cli.sample_rate = Some(Self::parse_value(&mut args, "--sample-rate")?),
                "--buffer-size" => cli.buffer_size = Some(Self::parse_value(&mut args, "--buffer-size")?),
                "--auto-config" => cli.auto_config = true,
                "--debug" => cli.debug = true,
                other => return Err(CliError(format!("unrecognized flag: {other}"))),
            }
        }
        Ok(cli)
    }

    fn require_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
        args.next().ok_or_else(|| CliError(format!("{flag} requires a value")))
    }

    fn parse_value<T: std::str::FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T, CliError> {
        let raw = Self::require_value(args, flag)?;
        raw.parse::<T>()
            .map_err(|_| CliError(format!("{flag} expects a number, got {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("flowcore".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn parses_every_documented_flag() {
        let cli = Cli::parse(argv(&[
            "--config",
            "session.json",
            "--device",
            "Focusrite",
            "--ip",
            "127.0.0.1",
            "--port",
            "9000",
            "--receive-port",
            "9001",
            "--sample-rate",
            "48000",
            "--buffer-size",
            "256",
            "--auto-config",
            "--debug",
        ]))
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("session.json"));
        assert_eq!(cli.port, Some(9000));
        assert!(cli.auto_config);
        assert!(cli.debug);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::parse(argv(&["--bogus"])).is_err());
    }

    #[test]
    fn rejects_missing_value() {
        assert!(Cli::parse(argv(&["--port"])).is_err());
    }
}
