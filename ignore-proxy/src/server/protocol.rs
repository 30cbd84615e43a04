//! Line protocol spoken between the proxy engine and the listener
//!
//! One command per line, one reply per command (except `LIST`, which replies
//! with one line per entry followed by `END`).

use crate::collector::{HandshakeFailure, NegotiationContext, TransportFailure};
use crate::error::{ProxyError, Result};
use std::net::{IpAddr, SocketAddr};

/// Maximum accepted line length in bytes
pub const MAX_LINE_LENGTH: usize = 4096;

/// Terminates a `LIST` reply
pub const END_OF_LIST: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `TRANSPORT <server-name|-> <error text...>`
    Transport(TransportFailure),
    /// `HANDSHAKE [sni=<name>] [ctx=<name>] [peer=<ip[:port]>]`
    Handshake(HandshakeFailure),
    /// `QUERY <host> [ip]`
    Query { host: String, ip: Option<IpAddr> },
    /// `LIST`
    List,
    /// `RELOAD`
    Reload,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (line, ""),
        };

        match verb.to_ascii_uppercase().as_str() {
            "TRANSPORT" => Ok(Command::Transport(parse_transport(rest)?)),
            "HANDSHAKE" => Ok(Command::Handshake(parse_handshake(rest)?)),
            "QUERY" => parse_query(rest),
            "LIST" => no_arguments(rest, Command::List),
            "RELOAD" => no_arguments(rest, Command::Reload),
            "" => Err(ProxyError::Protocol("empty command".to_string())),
            other => Err(ProxyError::Protocol(format!("unknown command: {}", other))),
        }
    }
}

fn parse_transport(args: &str) -> Result<TransportFailure> {
    let (name, error) = match args.split_once(char::is_whitespace) {
        Some((name, error)) => (name, error.trim()),
        None => (args, ""),
    };
    if name.is_empty() {
        return Err(ProxyError::Protocol(
            "TRANSPORT requires a server name or '-'".to_string(),
        ));
    }

    let server_name = (name != "-").then(|| name.to_string());
    let error = (!error.is_empty()).then(|| error.to_string());
    Ok(TransportFailure::new(server_name, error))
}

fn parse_handshake(args: &str) -> Result<HandshakeFailure> {
    let mut event = HandshakeFailure::default();

    for field in args.split_whitespace() {
        let Some((key, value)) = field.split_once('=') else {
            return Err(ProxyError::Protocol(format!("expected key=value, got {}", field)));
        };
        match key {
            "sni" => event.server_name = Some(value.to_string()),
            "ctx" => {
                event.context = Some(NegotiationContext {
                    server_name: Some(value.to_string()),
                })
            }
            "peer" => event.peer = Some(parse_peer(value)?),
            other => {
                return Err(ProxyError::Protocol(format!("unknown HANDSHAKE field: {}", other)))
            }
        }
    }

    Ok(event)
}

fn parse_query(args: &str) -> Result<Command> {
    let mut parts = args.split_whitespace();
    let host = parts
        .next()
        .ok_or_else(|| ProxyError::Protocol("QUERY requires a host".to_string()))?;
    let ip = parts.next().map(parse_peer).transpose()?;
    if parts.next().is_some() {
        return Err(ProxyError::Protocol("QUERY takes at most two arguments".to_string()));
    }

    Ok(Command::Query {
        host: host.to_string(),
        ip,
    })
}

/// Accept `ip`, `ip:port` or `[ipv6]:port`
fn parse_peer(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .or_else(|_| value.parse::<SocketAddr>().map(|addr| addr.ip()))
        .map_err(|_| ProxyError::Protocol(format!("invalid peer address: {}", value)))
}

fn no_arguments(rest: &str, command: Command) -> Result<Command> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ProxyError::Protocol(format!("unexpected arguments: {}", rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport() {
        let cmd = Command::parse("TRANSPORT bad.example.com TLS handshake error: bad cert").unwrap();
        assert_eq!(
            cmd,
            Command::Transport(TransportFailure::new(
                Some("bad.example.com".into()),
                Some("TLS handshake error: bad cert".into())
            ))
        );
    }

    #[test]
    fn test_parse_transport_without_server_name() {
        let cmd = Command::parse("transport - TLS alert").unwrap();
        assert_eq!(
            cmd,
            Command::Transport(TransportFailure::new(None, Some("TLS alert".into())))
        );

        let bare = Command::parse("TRANSPORT a.com").unwrap();
        assert_eq!(bare, Command::Transport(TransportFailure::new(Some("a.com".into()), None)));

        assert!(Command::parse("TRANSPORT").is_err());
    }

    #[test]
    fn test_parse_handshake_fields() {
        let cmd = Command::parse("HANDSHAKE ctx=ctx.example.com peer=[2001:db8::1]:443").unwrap();
        let Command::Handshake(event) = cmd else {
            panic!("expected handshake");
        };
        assert_eq!(event.server_name, None);
        assert_eq!(
            event.context.unwrap().server_name.as_deref(),
            Some("ctx.example.com")
        );
        assert_eq!(event.peer, Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_parse_handshake_empty_is_valid() {
        assert_eq!(
            Command::parse("HANDSHAKE").unwrap(),
            Command::Handshake(HandshakeFailure::default())
        );
    }

    #[test]
    fn test_parse_handshake_rejects_bad_fields() {
        assert!(Command::parse("HANDSHAKE sni").is_err());
        assert!(Command::parse("HANDSHAKE foo=bar").is_err());
        assert!(Command::parse("HANDSHAKE peer=not-an-ip").is_err());
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            Command::parse("QUERY a.example.com 10.0.0.1:443").unwrap(),
            Command::Query {
                host: "a.example.com".into(),
                ip: Some("10.0.0.1".parse().unwrap())
            }
        );
        assert_eq!(
            Command::parse("QUERY a.example.com").unwrap(),
            Command::Query {
                host: "a.example.com".into(),
                ip: None
            }
        );
        assert!(Command::parse("QUERY").is_err());
        assert!(Command::parse("QUERY a b c").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("LIST").unwrap(), Command::List);
        assert_eq!(Command::parse(" reload ").unwrap(), Command::Reload);
        assert!(Command::parse("LIST extra").is_err());
        assert!(Command::parse("").is_err());
        assert!(Command::parse("CONNECT a.com 443").is_err());
    }
}
