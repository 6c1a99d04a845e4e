//! Command line interface

use clap::App as ClapApp;
use std::ffi::OsString;

use super::{Dest, SessionConfig, DEFAULT_SIZE, DEFAULT_TIMEOUT, DEFAULT_TTL};
use crate::error::PingError;
use crate::logger::StdLogger;

/// Largest payload that fits into a single IPv4 datagram next to the IPv4 and ICMP headers
const MAX_SIZE: usize = 65_507 - 8;

/// Parsed command line
#[derive(Debug)]
pub struct Args {
    pub config: SessionConfig,
    pub verbose: bool,
}

/// Application initialization
pub struct App;

impl App {
    fn definition() -> ClapApp<'static, 'static> {
        clap_app!(echoping =>
            (version: crate_version!())
            (about: "Send ICMP echo requests to a host and report round-trip times")
            (@arg dest: -d --dest +takes_value +required "Destination host name or IPv4 address")
            (@arg count: -c --count +takes_value +allow_hyphen_values
                "Number of packets to send (-1 for no limit)")
            (@arg ttl: -m --ttl +takes_value +allow_hyphen_values "Sets the time to live (TTL), 1 to 255")
            (@arg size: -s --size +takes_value "Sets payload size (in Bytes)")
            (@arg strict: --strict "Only accept echo replies matching the request in flight")
            (@arg verbose: -v --verbose "Sets the level of verbosity"))
    }

    /// Retrieve user input from command line and initialise logging
    ///
    /// The user can modify the following parameters of the application:
    /// - dest: Either as IPv4 address or domain name (required)
    /// - count: The number of requests to send (default no limit)
    /// - ttl: The time to live for packets (default 128)
    /// - size: The payload size per packet (default 56 bytes)
    /// - strict: Reject replies that do not match the request in flight
    ///
    /// Help and version requests print their text and exit the process.
    pub fn parse_args() -> Result<SessionConfig, PingError> {
        let matches = Self::definition().get_matches();
        let verbose = matches.is_present("verbose");
        StdLogger::init(verbose);

        let config = Self::config_from(&matches)?;
        if config.size > 1472 {
            warn!("Beware of the Maximum Transmission Unit supported by your network device");
            warn!("If you do not receive any responses, try a smaller packet size");
        }

        trace!("Parsed configuration.");

        Ok(config)
    }

    /// Parse an explicit argument list, the first item being the program name
    ///
    /// Unlike `parse_args` this never exits the process and does not touch the logger.
    pub fn parse_from<I, T>(args: I) -> Result<Args, PingError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::definition()
            .get_matches_from_safe(args)
            .map_err(|e| PingError::InvalidArgument(e.message))?;

        Ok(Args {
            config: Self::config_from(&matches)?,
            verbose: matches.is_present("verbose"),
        })
    }

    fn config_from(matches: &clap::ArgMatches<'_>) -> Result<SessionConfig, PingError> {
        // `dest` is required, clap rejects the command line before we get here without it
        let dest = Dest::from(matches.value_of("dest").unwrap_or_default());

        let ttl = match matches.value_of("ttl") {
            Some(val) => parse_ttl(val)?,
            None => DEFAULT_TTL,
        };

        let count = match matches.value_of("count") {
            Some(val) => parse_count(val)?,
            None => None,
        };

        let size = match matches.value_of("size") {
            Some(val) => parse_size(val)?,
            None => DEFAULT_SIZE,
        };

        Ok(SessionConfig {
            dest,
            count,
            ttl,
            timeout: DEFAULT_TIMEOUT,
            size,
            strict: matches.is_present("strict"),
        })
    }
}

fn parse_ttl(val: &str) -> Result<u8, PingError> {
    let invalid = || PingError::InvalidArgument("TTL must be between 1 and 255".to_string());
    let ttl = val.parse::<i64>().map_err(|_| invalid())?;
    if ttl < 1 || ttl > 255 {
        return Err(invalid());
    }
    Ok(ttl as u8)
}

/// `-1` means no limit
fn parse_count(val: &str) -> Result<Option<u64>, PingError> {
    match val.parse::<i64>() {
        Ok(-1) => Ok(None),
        Ok(n) if n >= 0 => Ok(Some(n as u64)),
        _ => Err(PingError::InvalidArgument(format!(
            "Invalid packet count: {} (expected -1 or a non-negative integer)",
            val
        ))),
    }
}

fn parse_size(val: &str) -> Result<usize, PingError> {
    match val.parse::<usize>() {
        Ok(size) if size <= MAX_SIZE => Ok(size),
        _ => Err(PingError::InvalidArgument(format!(
            "Invalid packet size: {} (at most {} bytes)",
            val, MAX_SIZE
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn parse(args: &[&str]) -> Result<Args, PingError> {
        App::parse_from(std::iter::once("echoping").chain(args.iter().cloned()))
    }

    #[test]
    fn default_config() {
        let args = parse(&["-d", "127.0.0.1"]).unwrap();
        let config = args.config;

        assert_eq!(config.dest, Dest::Ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert_eq!(config.ttl, 128);
        assert_eq!(config.count, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.size, 56);
        assert!(!config.strict);
        assert!(!args.verbose);
    }

    #[test]
    fn all_flags() {
        let args = parse(&[
            "--dest", "example.com", "-c", "3", "-m", "64", "-s", "4", "--strict", "-v",
        ])
        .unwrap();
        let config = args.config;

        assert_eq!(config.dest, Dest::Host("example.com".to_string()));
        assert_eq!(config.count, Some(3));
        assert_eq!(config.ttl, 64);
        assert_eq!(config.size, 4);
        assert!(config.strict);
        assert!(args.verbose);
    }

    #[test]
    fn unbounded_count() {
        let args = parse(&["-d", "10.0.0.1", "-c", "-1"]).unwrap();
        assert_eq!(args.config.count, None);

        let args = parse(&["-d", "10.0.0.1", "--count=0"]).unwrap();
        assert_eq!(args.config.count, Some(0));
    }

    #[test]
    fn invalid_count() {
        assert!(matches!(
            parse(&["-d", "10.0.0.1", "-c", "-2"]),
            Err(PingError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse(&["-d", "10.0.0.1", "-c", "many"]),
            Err(PingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn ttl_bounds() {
        assert_eq!(parse(&["-d", "10.0.0.1", "-m", "1"]).unwrap().config.ttl, 1);
        assert_eq!(parse(&["-d", "10.0.0.1", "-m", "255"]).unwrap().config.ttl, 255);

        for ttl in &["0", "256", "-5", "abc"] {
            match parse(&["-d", "10.0.0.1", "--ttl", *ttl]) {
                Err(PingError::InvalidArgument(msg)) => {
                    assert_eq!(msg, "TTL must be between 1 and 255")
                }
                other => panic!("ttl {} accepted: {:?}", ttl, other),
            }
        }
    }

    #[test]
    fn oversized_payload() {
        assert!(matches!(
            parse(&["-d", "10.0.0.1", "-s", "70000"]),
            Err(PingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn destination_needs_flag() {
        assert!(matches!(
            parse(&["127.0.0.1"]),
            Err(PingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn destination_is_required() {
        assert!(matches!(parse(&[]), Err(PingError::InvalidArgument(_))));
    }
}
