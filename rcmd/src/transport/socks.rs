//! SOCKS4 / SOCKS4a CONNECT handshake.

use std::net::Ipv4Addr;

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

const SOCKS_VERSION: u8 = 0x04;
const CMD_CONNECT: u8 = 0x01;
const REPLY_GRANTED: u8 = 0x5A;

/// Build the CONNECT request.
///
/// IPv4 literals are sent as-is. Anything else goes out as SOCKS4a: the
/// placeholder address 0.0.0.1 followed by the NUL-terminated hostname.
fn connect_request(target: &str, port: u16) -> Vec<u8> {
    let mut request = Vec::with_capacity(9 + target.len() + 1);
    request.push(SOCKS_VERSION);
    request.push(CMD_CONNECT);
    request.extend_from_slice(&port.to_be_bytes());

    match target.parse::<Ipv4Addr>() {
        Ok(addr) => {
            request.extend_from_slice(&addr.octets());
            // empty user id
            request.push(0);
        }
        Err(_) => {
            request.extend_from_slice(&[0, 0, 0, 1]);
            request.push(0);
            request.extend_from_slice(target.as_bytes());
            request.push(0);
        }
    }

    request
}

/// Ask the SOCKS4 relay on `stream` to connect to `target:port`.
///
/// On success the stream carries the tunnelled connection.
pub async fn socks4_connect<S>(stream: &mut S, target: &str, port: u16) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = connect_request(target, port);
    trace!("socks4 connect {}:{}", target, port);
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;

    match reply[1] {
        REPLY_GRANTED => Ok(()),
        status => Err(TransportError::SocksRejected { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_ipv4_target() {
        let request = connect_request("10.1.2.3", 23);
        assert_eq!(request, vec![0x04, 0x01, 0x00, 0x17, 10, 1, 2, 3, 0x00]);
    }

    #[test]
    fn test_request_for_hostname_uses_socks4a() {
        let request = connect_request("sw1", 23);
        assert_eq!(
            request,
            vec![0x04, 0x01, 0x00, 0x17, 0, 0, 0, 1, 0x00, b's', b'w', b'1', 0x00]
        );
    }

    #[tokio::test]
    async fn test_connect_granted() {
        let mut stream = tokio_test::io::Builder::new()
            .write(&[0x04, 0x01, 0x00, 0x17, 10, 1, 2, 3, 0x00])
            .read(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0])
            .build();

        socks4_connect(&mut stream, "10.1.2.3", 23).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .write(&[0x04, 0x01, 0x00, 0x17, 10, 1, 2, 3, 0x00])
            .read(&[0x00, 0x5B, 0, 0, 0, 0, 0, 0])
            .build();

        let err = socks4_connect(&mut stream, "10.1.2.3", 23)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::SocksRejected { status: 0x5B }));
    }
}
