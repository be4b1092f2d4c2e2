use async_nbt::io::Flavor;
use async_nbt::NbtCompound;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::err::ProtError;
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};

#[async_trait]
impl WriteProt for NbtCompound {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        async_nbt::io::write_nbt(stream, None, self, Flavor::Uncompressed)
            .await
            .map_err(|x| ProtError::Nbt(format!("{x:?}")))?;
        Ok(())
    }
}

#[async_trait]
impl ReadProt for NbtCompound {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        Ok(async_nbt::io::read_nbt(stream, Flavor::Uncompressed, true)
            .await
            .map_err(|x| ProtError::Nbt(format!("{x:?}")))?
            .0)
    }
}

impl SizedProt for NbtCompound {
    fn prot_size(&self) -> usize {
        async_nbt::io::size(self, Flavor::Uncompressed, None).unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_nbt::NbtTag;

    #[tokio::test]
    async fn compound_roundtrip() -> Result<(), ProtError> {
        let mut compound = NbtCompound::new();
        compound.insert("id".to_string(), NbtTag::String("minecraft:chest".into()));
        compound.insert("Items".to_string(), NbtTag::Int(0));
        let mut buf: Vec<u8> = vec![];
        compound.write(&mut buf).await?;
        let back = NbtCompound::read(&mut buf.as_slice()).await?;
        assert_eq!(back, compound);
        Ok(())
    }
}
