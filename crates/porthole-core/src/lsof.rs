//! Parsing of `lsof` field output.
//!
//! The fallback backend runs `lsof -iTCP -sTCP:LISTEN -nP -F pcn`,
//! which emits one field per line tagged by its first character:
//! `p` for a process id (starting a new process block), `c` for the
//! command name, `n` for a local address. This module turns that
//! stream back into listener records.

use crate::enumerate::Listener;

/// Parse `lsof -F pcn` output into listener records.
///
/// Only sockets bound to a loopback-equivalent address survive.
/// Unknown field tags are ignored, so builds of lsof that emit extra
/// fields do not break the parse.
pub fn parse_listing(output: &str) -> Vec<Listener> {
    let mut listeners = Vec::new();
    let mut pid = None;
    let mut process = String::new();

    for line in output.lines() {
        match line.as_bytes().first() {
            Some(b'p') => {
                pid = line[1..].parse().ok();
                process.clear();
            }
            Some(b'c') => process = line[1..].to_string(),
            Some(b'n') => {
                if let Some((host, port)) = split_address(&line[1..]) {
                    if is_loopback_notation(host) {
                        listeners.push(Listener {
                            port,
                            pid,
                            process: process.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    listeners
}

/// Split `127.0.0.1:8080`, `[::1]:5000`, or `*:3000` into host and
/// port. The port is always the piece after the last colon.
fn split_address(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    Some((host, port.parse().ok()?))
}

/// Loopback-equivalent spellings as lsof prints them: IPv6 addresses
/// arrive bracketed, and `*` means a wildcard bind.
fn is_loopback_notation(host: &str) -> bool {
    let bare = host.trim_matches(|c| c == '[' || c == ']');
    matches!(bare, "127.0.0.1" | "::1" | "0.0.0.0" | "::" | "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSOF_OUTPUT: &str = "\
p512
cnode
n127.0.0.1:3000
n[::1]:3000
p839
cpostgres
n127.0.0.1:5432
p1044
cngrok
n192.168.1.20:4040
p2001
cpython3
n*:8000
";

    #[test]
    fn test_parse_listing() {
        let listeners = parse_listing(LSOF_OUTPUT);

        assert_eq!(listeners.len(), 4);
        assert_eq!(listeners[0].port, 3000);
        assert_eq!(listeners[0].pid, Some(512));
        assert_eq!(listeners[0].process, "node");
        // dual-stack listener shows up once per family; dedup is the
        // enumerator's job, not the parser's
        assert_eq!(listeners[1].port, 3000);
        assert_eq!(listeners[2].port, 5432);
        assert_eq!(listeners[2].process, "postgres");
        assert_eq!(listeners[3].port, 8000);
        assert_eq!(listeners[3].process, "python3");
    }

    #[test]
    fn test_non_local_binds_skipped() {
        let listeners = parse_listing(LSOF_OUTPUT);
        assert!(listeners.iter().all(|l| l.port != 4040));
    }

    #[test]
    fn test_wildcard_and_bracketed_addresses() {
        assert!(is_loopback_notation("*"));
        assert!(is_loopback_notation("[::]"));
        assert!(is_loopback_notation("[::1]"));
        assert!(is_loopback_notation("0.0.0.0"));
        assert!(!is_loopback_notation("192.168.1.20"));
        assert!(!is_loopback_notation("fe80::1%lo0"));
    }

    #[test]
    fn test_unknown_tags_and_junk_ignored() {
        let listeners = parse_listing("p77\ncnginx\nf12u\ngarbage\nn127.0.0.1:8080\nnbadline\n");
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].port, 8080);
        assert_eq!(listeners[0].process, "nginx");
        assert_eq!(listeners[0].pid, Some(77));
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_listing("").is_empty());
    }
}
