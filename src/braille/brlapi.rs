//! BrlAPI client (BRLTTY's display sharing protocol)
//!
//! Packets are a big-endian `u32` payload size and `u32` type, then the
//! payload. After the handshake a reader thread owns a clone of the socket,
//! turning key packets into `BrailleCommand`s and dropping acknowledgements.

use super::{BrailleCommand, BrailleDriver, CommandSink, Dots};
use crate::{NvdaError, Result};
use log::{debug, error, info, warn};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

const PROTOCOL_VERSION: u32 = 8;

const PACKET_VERSION: u32 = b'v' as u32;
const PACKET_AUTH: u32 = b'a' as u32;
const PACKET_GET_DISPLAY_SIZE: u32 = b's' as u32;
const PACKET_ENTER_TTY_MODE: u32 = b't' as u32;
const PACKET_LEAVE_TTY_MODE: u32 = b'L' as u32;
const PACKET_WRITE: u32 = b'w' as u32;
const PACKET_KEY: u32 = b'k' as u32;
const PACKET_ACK: u32 = b'A' as u32;
const PACKET_ERROR: u32 = b'e' as u32;
const PACKET_EXCEPTION: u32 = b'E' as u32;

const AUTH_NONE: u32 = b'N' as u32;
const AUTH_KEY: u32 = b'K' as u32;

const WF_REGION: u32 = 0x02;
const WF_TEXT: u32 = 0x04;
const WF_ATTR_OR: u32 = 0x10;
const WF_CURSOR: u32 = 0x20;

const KEY_TYPE_MASK: u64 = 0xE000_0000;
const KEY_TYPE_CMD: u64 = 0x2000_0000;
const KEY_CMD_BLK_MASK: u64 = 0x1FFF_0000;
const KEY_CMD_ARG_MASK: u64 = 0x0000_FFFF;
const KEY_CMD_ROUTE: u64 = 1 << 16;

const CMD_TOP: u64 = 9;
const CMD_BOT: u64 = 10;
const CMD_TOP_LEFT: u64 = 11;
const CMD_BOT_LEFT: u64 = 12;
const CMD_HWINLT: u64 = 21;
const CMD_HWINRT: u64 = 22;
const CMD_FWINLT: u64 = 23;
const CMD_FWINRT: u64 = 24;
const CMD_LNBEG: u64 = 27;
const CMD_LNEND: u64 = 28;
const CMD_HOME: u64 = 29;

const DEFAULT_SOCKET_DIR: &str = "/var/lib/BrlAPI";
const DEFAULT_KEY_FILE: &str = "/etc/brlapi.key";
const TCP_BASE_PORT: u16 = 4101;

/// Upper bound on payload sizes accepted from the server
const MAX_PACKET: usize = 512;

/// Socket to the BrlAPI server
enum Connection {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Connection {
    fn try_clone(&self) -> io::Result<Connection> {
        match self {
            Connection::Unix(s) => s.try_clone().map(Connection::Unix),
            Connection::Tcp(s) => s.try_clone().map(Connection::Tcp),
        }
    }

    fn shutdown(&self) {
        let _ = match self {
            Connection::Unix(s) => s.shutdown(Shutdown::Both),
            Connection::Tcp(s) => s.shutdown(Shutdown::Both),
        };
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Unix(s) => s.read(buf),
            Connection::Tcp(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Unix(s) => s.write(buf),
            Connection::Tcp(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Unix(s) => s.flush(),
            Connection::Tcp(s) => s.flush(),
        }
    }
}

/// Where the server listens: `:N` is local socket N, `host:N` is TCP
#[derive(Debug, Clone, PartialEq)]
pub struct BrlapiHost {
    pub host: Option<String>,
    pub number: u16,
}

impl BrlapiHost {
    /// Parse a `BRLAPI_HOST` value
    pub fn parse(s: &str) -> BrlapiHost {
        let (host, number) = match s.rsplit_once(':') {
            Some((host, number)) => (host, number.parse().unwrap_or(0)),
            None => (s, 0),
        };
        BrlapiHost {
            host: (!host.is_empty()).then(|| host.to_string()),
            number,
        }
    }
}

/// Encode one packet
pub fn encode_packet(packet_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&packet_type.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Read one packet: (type, payload)
pub fn read_packet<R: Read>(reader: &mut R) -> io::Result<(u32, Vec<u8>)> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let packet_type = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if size > MAX_PACKET {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("BrlAPI packet too large: {}", size),
        ));
    }
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload)?;
    Ok((packet_type, payload))
}

fn be_u32(payload: &[u8], at: usize) -> Option<u32> {
    let bytes = payload.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Payload of a write packet putting `cells` at the start of the display
///
/// The text is blank and the cells are OR-ed on top as dot attributes,
/// so any display table gives the same result.
pub fn write_payload(cells: &[Dots]) -> Vec<u8> {
    let size = cells.len() as u32;
    let mut buf = Vec::with_capacity(24 + 2 * cells.len());
    buf.extend_from_slice(&(WF_REGION | WF_TEXT | WF_ATTR_OR | WF_CURSOR).to_be_bytes());
    buf.extend_from_slice(&1u32.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend(std::iter::repeat(b' ').take(cells.len()));
    buf.extend_from_slice(cells);
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf
}

/// Map a BrlAPI key code onto a command; unbound keys give `None`
pub fn decode_key(code: u64) -> Option<BrailleCommand> {
    if code & KEY_TYPE_MASK != KEY_TYPE_CMD {
        return None;
    }
    let block = code & KEY_CMD_BLK_MASK;
    let arg = code & KEY_CMD_ARG_MASK;
    if block == KEY_CMD_ROUTE {
        return Some(BrailleCommand::Route(arg as u16));
    }
    if block != 0 {
        return None;
    }
    match arg {
        CMD_FWINLT | CMD_HWINLT => Some(BrailleCommand::ScrollLeft),
        CMD_FWINRT | CMD_HWINRT => Some(BrailleCommand::ScrollRight),
        CMD_TOP | CMD_TOP_LEFT | CMD_LNBEG | CMD_HOME => Some(BrailleCommand::Home),
        CMD_BOT | CMD_BOT_LEFT | CMD_LNEND => Some(BrailleCommand::End),
        _ => None,
    }
}

fn protocol_error(what: &str, packet_type: u32, payload: &[u8]) -> NvdaError {
    if packet_type == PACKET_ERROR {
        let code = be_u32(payload, 0).unwrap_or(0);
        return NvdaError::Braille(format!("BrlAPI refused {}: error {}", what, code));
    }
    NvdaError::Braille(format!(
        "Unexpected BrlAPI packet during {}: {:?}",
        what,
        char::from_u32(packet_type).unwrap_or('?')
    ))
}

fn expect_packet<S: Read>(stream: &mut S, wanted: u32, what: &str) -> Result<Vec<u8>> {
    let (packet_type, payload) = read_packet(stream)?;
    if packet_type != wanted {
        return Err(protocol_error(what, packet_type, &payload));
    }
    Ok(payload)
}

/// Version, authorization, display size, tty mode. Returns the cell count.
pub fn handshake<S: Read + Write>(stream: &mut S, key: Option<&[u8]>, tty: u32) -> Result<usize> {
    let server = expect_packet(stream, PACKET_VERSION, "version")?;
    debug!("BrlAPI server protocol {:?}", be_u32(&server, 0));
    stream.write_all(&encode_packet(PACKET_VERSION, &PROTOCOL_VERSION.to_be_bytes()))?;

    let offered = expect_packet(stream, PACKET_AUTH, "authorization")?;
    let methods: Vec<u32> = offered.chunks_exact(4).filter_map(|c| be_u32(c, 0)).collect();
    if !methods.contains(&AUTH_NONE) {
        match (methods.contains(&AUTH_KEY), key) {
            (true, Some(key)) => {
                let mut payload = AUTH_KEY.to_be_bytes().to_vec();
                payload.extend_from_slice(key);
                stream.write_all(&encode_packet(PACKET_AUTH, &payload))?;
                expect_packet(stream, PACKET_ACK, "authorization")?;
            }
            _ => {
                return Err(NvdaError::Braille(
                    "BrlAPI requires authorization this client cannot provide".to_string(),
                ))
            }
        }
    }

    stream.write_all(&encode_packet(PACKET_GET_DISPLAY_SIZE, &[]))?;
    let size = expect_packet(stream, PACKET_GET_DISPLAY_SIZE, "display size")?;
    let columns = be_u32(&size, 0).unwrap_or(0) as usize;

    let mut payload = 1u32.to_be_bytes().to_vec();
    payload.extend_from_slice(&tty.to_be_bytes());
    // No driver name: keys arrive as commands
    payload.push(0);
    stream.write_all(&encode_packet(PACKET_ENTER_TTY_MODE, &payload))?;
    expect_packet(stream, PACKET_ACK, "tty mode")?;

    Ok(columns)
}

/// Virtual terminal the session runs on
fn tty_number() -> u32 {
    for var in ["CONTROLVT", "XDG_VTNR"] {
        if let Some(n) = env::var(var).ok().and_then(|v| v.trim().parse().ok()) {
            return n;
        }
    }
    env::var("WINDOWPATH")
        .ok()
        .and_then(|p| p.split(':').next().and_then(|n| n.parse().ok()))
        .unwrap_or(1)
}

fn reader_loop(mut conn: Connection, sink: Option<CommandSink>) {
    loop {
        match read_packet(&mut conn) {
            Ok((PACKET_KEY, payload)) => {
                let (Some(high), Some(low)) = (be_u32(&payload, 0), be_u32(&payload, 4)) else {
                    warn!("Short BrlAPI key packet");
                    continue;
                };
                let code = ((high as u64) << 32) | low as u64;
                match (decode_key(code), &sink) {
                    (Some(cmd), Some(sink)) => sink(cmd),
                    (Some(_), None) => {}
                    (None, _) => debug!("Unbound braille key {:#x}", code),
                }
            }
            Ok((PACKET_ACK, _)) => {}
            Ok((PACKET_ERROR, payload)) | Ok((PACKET_EXCEPTION, payload)) => {
                error!("BrlAPI error {:?}", be_u32(&payload, 0));
            }
            Ok((other, _)) => debug!("Ignoring BrlAPI packet type {:#x}", other),
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    debug!("BrlAPI reader stopped: {}", e);
                }
                break;
            }
        }
    }
    debug!("BrlAPI reader thread exiting");
}

/// Driver for displays served by BRLTTY
pub struct BrlapiDriver {
    host: BrlapiHost,
    socket_dir: PathBuf,
    key_file: PathBuf,
    conn: Option<Connection>,
    columns: Option<usize>,
    sink: Option<CommandSink>,
    reader: Option<JoinHandle<()>>,
}

impl BrlapiDriver {
    pub fn new(host: BrlapiHost, sink: Option<CommandSink>) -> Self {
        Self {
            host,
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            conn: None,
            columns: None,
            sink,
            reader: None,
        }
    }

    /// Honour `BRLAPI_HOST`, `BRLAPI_SOCKETPATH` and `BRLAPI_AUTH`
    pub fn from_env(sink: Option<CommandSink>) -> Self {
        let host = BrlapiHost::parse(&env::var("BRLAPI_HOST").unwrap_or_else(|_| ":0".to_string()));
        let mut driver = Self::new(host, sink);
        if let Ok(dir) = env::var("BRLAPI_SOCKETPATH") {
            driver.socket_dir = PathBuf::from(dir);
        }
        if let Some(file) = env::var("BRLAPI_AUTH")
            .ok()
            .and_then(|a| a.strip_prefix("keyfile:").map(PathBuf::from))
        {
            driver.key_file = file;
        }
        driver
    }

    fn open(&self) -> Result<Connection> {
        if self.host.host.is_none() {
            let path = self.socket_dir.join(self.host.number.to_string());
            match UnixStream::connect(&path) {
                Ok(stream) => return Ok(Connection::Unix(stream)),
                Err(e) => debug!("BrlAPI socket {:?} unavailable: {}", path, e),
            }
        }
        let host = self.host.host.as_deref().unwrap_or("localhost");
        let port = TCP_BASE_PORT + self.host.number;
        TcpStream::connect((host, port))
            .map(Connection::Tcp)
            .map_err(|e| NvdaError::Braille(format!("Cannot reach BrlAPI at {}:{}: {}", host, port, e)))
    }
}

impl BrailleDriver for BrlapiDriver {
    fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let mut conn = self.open()?;
        let key = fs::read(&self.key_file).ok();
        let columns = handshake(&mut conn, key.as_deref(), tty_number())?;
        info!("BrlAPI display with {} cells", columns);

        let reader_conn = conn.try_clone()?;
        let sink = self.sink.take();
        let handle = thread::Builder::new()
            .name("brlapi-reader".to_string())
            .spawn(move || reader_loop(reader_conn, sink))?;

        self.columns = (columns > 0).then_some(columns);
        self.conn = Some(conn);
        self.reader = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.write_all(&encode_packet(PACKET_LEAVE_TTY_MODE, &[]));
            conn.shutdown();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        self.columns = None;
        Ok(())
    }

    fn display_size(&self) -> Option<usize> {
        self.columns
    }

    fn write_cells(&mut self, cells: &[Dots]) -> Result<()> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| NvdaError::Braille("BrlAPI not connected".to_string()))?;
        conn.write_all(&encode_packet(PACKET_WRITE, &write_payload(cells)))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "brlapi"
    }
}

impl Drop for BrlapiDriver {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(stream: &mut UnixStream, packet_type: u32, payload: &[u8]) {
        stream.write_all(&encode_packet(packet_type, payload)).unwrap();
    }

    #[test]
    fn test_host_parsing() {
        assert_eq!(BrlapiHost::parse(":0"), BrlapiHost { host: None, number: 0 });
        assert_eq!(
            BrlapiHost::parse("braille.local:2"),
            BrlapiHost { host: Some("braille.local".to_string()), number: 2 }
        );
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key(KEY_TYPE_CMD | CMD_FWINRT), Some(BrailleCommand::ScrollRight));
        assert_eq!(decode_key(KEY_TYPE_CMD | CMD_HOME), Some(BrailleCommand::Home));
        assert_eq!(decode_key(KEY_TYPE_CMD | KEY_CMD_ROUTE | 7), Some(BrailleCommand::Route(7)));
        // Keyboard symbols are not display commands
        assert_eq!(decode_key(0x61), None);
    }

    #[test]
    fn test_write_payload_layout() {
        let payload = write_payload(&[0b1, 0b11]);
        assert_eq!(be_u32(&payload, 0), Some(WF_REGION | WF_TEXT | WF_ATTR_OR | WF_CURSOR));
        assert_eq!(be_u32(&payload, 4), Some(1));
        assert_eq!(be_u32(&payload, 8), Some(2));
        assert_eq!(be_u32(&payload, 12), Some(2));
        assert_eq!(&payload[16..18], b"  ");
        assert_eq!(&payload[18..20], &[0b1, 0b11]);
        assert_eq!(be_u32(&payload, 20), Some(0));
    }

    #[test]
    fn test_handshake_with_key() {
        let (mut client, mut server) = UnixStream::pair().unwrap();
        let fake = thread::spawn(move || {
            send(&mut server, PACKET_VERSION, &PROTOCOL_VERSION.to_be_bytes());
            assert_eq!(read_packet(&mut server).unwrap().0, PACKET_VERSION);
            send(&mut server, PACKET_AUTH, &AUTH_KEY.to_be_bytes());
            let (ty, payload) = read_packet(&mut server).unwrap();
            assert_eq!(ty, PACKET_AUTH);
            assert_eq!(&payload[4..], b"secret");
            send(&mut server, PACKET_ACK, &[]);
            assert_eq!(read_packet(&mut server).unwrap().0, PACKET_GET_DISPLAY_SIZE);
            let mut size = 40u32.to_be_bytes().to_vec();
            size.extend_from_slice(&1u32.to_be_bytes());
            send(&mut server, PACKET_GET_DISPLAY_SIZE, &size);
            let (ty, payload) = read_packet(&mut server).unwrap();
            assert_eq!(ty, PACKET_ENTER_TTY_MODE);
            assert_eq!(be_u32(&payload, 4), Some(3));
            send(&mut server, PACKET_ACK, &[]);
        });

        let cells = handshake(&mut client, Some(b"secret"), 3).unwrap();
        assert_eq!(cells, 40);
        fake.join().unwrap();
    }

    #[test]
    fn test_handshake_refused() {
        let (mut client, mut server) = UnixStream::pair().unwrap();
        let fake = thread::spawn(move || {
            send(&mut server, PACKET_VERSION, &PROTOCOL_VERSION.to_be_bytes());
            let _ = read_packet(&mut server);
            send(&mut server, PACKET_AUTH, &AUTH_KEY.to_be_bytes());
        });
        assert!(handshake(&mut client, None, 1).is_err());
        fake.join().unwrap();
    }
}
