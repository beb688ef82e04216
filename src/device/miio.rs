//! Local miIO protocol transport.
//!
//! Every exchange is a single UDP datagram each way. A packet is a 32-byte
//! header followed by an AES-128-CBC encrypted JSON payload:
//!
//! ```text
//!  0      2      4             8             12            16                32
//!  | 2131 | len  |   unknown   |  device id  |    stamp    |    checksum     | payload..
//! ```
//!
//! The key is `MD5(token)`, the IV is `MD5(key ‖ token)` and the checksum is
//! `MD5(header[..16] ‖ token ‖ payload)`. Before the first request the client
//! sends a "hello" packet whose reply tells it the device id and clock.

use crate::config::{Token, TOKEN_LEN};
use crate::error::{ExporterError, Result};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

/// UDP port the devices listen on.
pub const MIIO_PORT: u16 = 54321;

/// Size of the packet header.
pub const HEADER_LEN: usize = 32;

const MAGIC: u16 = 0x2131;
const RECV_BUFFER_LEN: usize = 4096;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// A decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: u16,
    pub unknown: u32,
    pub device_id: u32,
    pub stamp: u32,
    pub checksum: [u8; 16],
}

impl Header {
    /// Parse the header of a complete packet.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() < HEADER_LEN {
            return Err(ExporterError::protocol_error(format!(
                "packet too short: {} bytes",
                packet.len()
            )));
        }

        let magic = u16::from_be_bytes([packet[0], packet[1]]);
        if magic != MAGIC {
            return Err(ExporterError::protocol_error(format!(
                "bad magic 0x{:04x}",
                magic
            )));
        }

        let length = u16::from_be_bytes([packet[2], packet[3]]);
        if usize::from(length) != packet.len() {
            return Err(ExporterError::protocol_error(format!(
                "header announces {} bytes but packet has {}",
                length,
                packet.len()
            )));
        }

        let mut checksum = [0u8; 16];
        checksum.copy_from_slice(&packet[16..32]);

        Ok(Self {
            length,
            unknown: be_u32(&packet[4..8]),
            device_id: be_u32(&packet[8..12]),
            stamp: be_u32(&packet[12..16]),
            checksum,
        })
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// The discovery packet: magic, length 32, everything else `0xff`.
pub fn hello_packet() -> [u8; HEADER_LEN] {
    let mut packet = [0xffu8; HEADER_LEN];
    packet[..2].copy_from_slice(&MAGIC.to_be_bytes());
    packet[2..4].copy_from_slice(&(HEADER_LEN as u16).to_be_bytes());
    packet
}

/// Encodes and decodes packets for one device token.
#[derive(Clone)]
pub struct Codec {
    token: [u8; TOKEN_LEN],
    key: [u8; 16],
    iv: [u8; 16],
}

impl Codec {
    pub fn new(token: &Token) -> Self {
        let token = *token.as_bytes();
        let key: [u8; 16] = Md5::digest(token).into();

        let mut hasher = Md5::new();
        hasher.update(key);
        hasher.update(token);
        let iv: [u8; 16] = hasher.finalize().into();

        Self { token, key, iv }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| {
                ExporterError::protocol_error("failed to decrypt payload, is the token correct?")
            })
    }

    fn checksum(&self, header: &[u8], payload: &[u8]) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(&header[..16]);
        hasher.update(self.token);
        hasher.update(payload);
        hasher.finalize().into()
    }

    /// Build a complete packet carrying `payload`.
    pub fn encode(&self, device_id: u32, stamp: u32, payload: &[u8]) -> Result<Vec<u8>> {
        let encrypted = self.encrypt(payload);
        let length = u16::try_from(HEADER_LEN + encrypted.len()).map_err(|_| {
            ExporterError::protocol_error(format!("payload too large: {} bytes", payload.len()))
        })?;

        let mut packet = Vec::with_capacity(usize::from(length));
        packet.extend_from_slice(&MAGIC.to_be_bytes());
        packet.extend_from_slice(&length.to_be_bytes());
        packet.extend_from_slice(&0u32.to_be_bytes());
        packet.extend_from_slice(&device_id.to_be_bytes());
        packet.extend_from_slice(&stamp.to_be_bytes());
        let checksum = self.checksum(&packet, &encrypted);
        packet.extend_from_slice(&checksum);
        packet.extend_from_slice(&encrypted);

        Ok(packet)
    }

    /// Verify and decrypt a packet. Header-only packets yield an empty payload.
    pub fn decode(&self, packet: &[u8]) -> Result<(Header, Vec<u8>)> {
        let header = Header::parse(packet)?;
        let encrypted = &packet[HEADER_LEN..];
        if encrypted.is_empty() {
            return Ok((header, Vec::new()));
        }

        if self.checksum(packet, encrypted) != header.checksum {
            return Err(ExporterError::protocol_error("checksum mismatch"));
        }

        Ok((header, self.decrypt(encrypted)?))
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// A socket plus the device clock learned from the hello reply.
struct Connection {
    socket: UdpSocket,
    device_id: u32,
    stamp: u32,
    received: Instant,
}

impl Connection {
    async fn open(addr: SocketAddr, limit: Duration) -> Result<Self> {
        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;

        let reply = round_trip(&socket, &hello_packet(), limit).await?;
        let header = Header::parse(&reply)?;
        debug!(
            "Handshake with {} done, device id {} stamp {}",
            addr, header.device_id, header.stamp
        );

        Ok(Self {
            socket,
            device_id: header.device_id,
            stamp: header.stamp,
            received: Instant::now(),
        })
    }

    fn next_stamp(&self) -> u32 {
        let elapsed = u32::try_from(self.received.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.stamp.wrapping_add(elapsed).wrapping_add(1)
    }
}

async fn round_trip(socket: &UdpSocket, packet: &[u8], limit: Duration) -> Result<Vec<u8>> {
    socket.send(packet).await?;

    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let len = timeout(limit, socket.recv(&mut buf))
        .await
        .map_err(|_| ExporterError::Timeout(limit))??;
    buf.truncate(len);
    trace!("Received {} bytes", len);

    Ok(buf)
}

/// JSON-RPC client for a single miIO device.
pub struct MiioClient {
    addr: SocketAddr,
    codec: Codec,
    timeout: Duration,
    connection: Option<Connection>,
    last_id: u64,
}

impl MiioClient {
    /// Create a client. No I/O happens until the first request.
    pub fn new(addr: SocketAddr, token: &Token, timeout: Duration) -> Self {
        Self {
            addr,
            codec: Codec::new(token),
            timeout,
            connection: None,
            last_id: 0,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Call `method` and return its `result`.
    ///
    /// A transport or protocol failure drops the connection so the next call
    /// starts over with a fresh handshake.
    pub async fn send(&mut self, method: &str, params: Value) -> Result<Value> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => Connection::open(self.addr, self.timeout).await?,
        };

        self.last_id += 1;
        let result = self.request(&connection, self.last_id, method, params).await;
        if matches!(result, Ok(_) | Err(ExporterError::Device { .. })) {
            self.connection = Some(connection);
        }

        result
    }

    async fn request(
        &self,
        connection: &Connection,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let payload = serde_json::to_vec(&json!({
            "id": id,
            "method": method,
            "params": params,
        }))?;
        trace!("Sending {} (id {}) to {}", method, id, self.addr);

        let packet = self
            .codec
            .encode(connection.device_id, connection.next_stamp(), &payload)?;
        let reply = round_trip(&connection.socket, &packet, self.timeout).await?;
        let (_, plaintext) = self.codec.decode(&reply)?;

        let response: Response = serde_json::from_slice(strip_nul(&plaintext))?;
        if response.id != id {
            return Err(ExporterError::protocol_error(format!(
                "reply id {} does not match request id {}",
                response.id, id
            )));
        }
        if let Some(error) = response.error {
            return Err(ExporterError::Device {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| ExporterError::protocol_error("reply has neither result nor error"))
    }
}

fn strip_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> Codec {
        Codec::new(&Token::from_hex("00112233445566778899aabbccddeeff").unwrap())
    }

    #[test]
    fn test_hello_packet_layout() {
        let packet = hello_packet();
        assert_eq!(&packet[..4], &[0x21, 0x31, 0x00, 0x20]);
        assert!(packet[4..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_encode_layout_and_decode() {
        let codec = codec();
        let payload = br#"{"id":1,"method":"get_status","params":[]}"#;
        let packet = codec.encode(0x0102_0304, 77, payload).unwrap();

        // 42 bytes of JSON pad to 48 bytes of ciphertext
        assert_eq!(packet.len(), HEADER_LEN + 48);
        let header = Header::parse(&packet).unwrap();
        assert_eq!(usize::from(header.length), packet.len());
        assert_eq!(header.unknown, 0);
        assert_eq!(header.device_id, 0x0102_0304);
        assert_eq!(header.stamp, 77);

        let (_, plaintext) = codec.decode(&packet).unwrap();
        assert_eq!(plaintext, payload);
    }

    #[test]
    fn test_tampered_packet_is_rejected() {
        let codec = codec();
        let mut packet = codec.encode(1, 1, b"{}").unwrap();
        let last = packet.len() - 1;
        packet[last] ^= 0x01;
        assert!(matches!(codec.decode(&packet), Err(ExporterError::Protocol(_))));
    }

    #[test]
    fn test_wrong_token_cannot_decode() {
        let packet = codec().encode(1, 1, b"{\"id\":1}").unwrap();
        let other = Codec::new(&Token::from_hex("ffeeddccbbaa99887766554433221100").unwrap());
        assert!(other.decode(&packet).is_err());
    }

    #[test]
    fn test_header_rejects_garbage() {
        assert!(Header::parse(&[0u8; 8]).is_err());
        let mut packet = hello_packet();
        packet[0] = 0x00;
        assert!(Header::parse(&packet).is_err());
        let mut packet = hello_packet().to_vec();
        packet.push(0);
        assert!(Header::parse(&packet).is_err());
    }

    #[test]
    fn test_strip_nul() {
        assert_eq!(strip_nul(b"{}\0\0"), b"{}");
        assert_eq!(strip_nul(b"\0"), b"");
        assert_eq!(strip_nul(b"{}"), b"{}");
    }
}
