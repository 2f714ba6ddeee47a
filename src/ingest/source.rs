//! Trait abstraction for the datagram transport to enable testing

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Trait for receiving command datagrams
#[async_trait]
pub trait DatagramSource: Send {
    /// Receive one datagram into `buf`, returning its length and sender
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Address the source is bound to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One scripted receive result: a datagram or an error kind
    pub type Step = Result<Vec<u8>, io::ErrorKind>;

    /// Datagram source that replays a script, then waits forever
    #[derive(Clone)]
    pub struct ScriptedSource {
        pub script: Arc<Mutex<VecDeque<Step>>>,
        pub peer: SocketAddr,
    }

    impl ScriptedSource {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.into())),
                peer: "192.168.0.30:40000".parse().unwrap(),
            }
        }

        pub fn remaining(&self) -> usize {
            self.script.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DatagramSource for ScriptedSource {
        async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(datagram)) => {
                    let len = datagram.len().min(buf.len());
                    buf[..len].copy_from_slice(&datagram[..len]);
                    Ok((len, self.peer))
                }
                Some(Err(kind)) => Err(io::Error::new(kind, "Scripted receive error")),
                None => std::future::pending().await,
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:8910".parse().unwrap())
        }
    }
}
