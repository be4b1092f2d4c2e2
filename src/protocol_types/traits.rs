use crate::err::ProtError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

#[async_trait]
pub trait ReadProt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized;
}

#[async_trait]
pub trait WriteProt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError>;
}

pub trait SizedProt {
    fn prot_size(&self) -> usize;
}
