use std::fmt::{Debug, Display, Formatter};

use crate::err::ProtError;
use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SEGMENT_BITS: u8 = 0x7f;
const CONTINUE_BIT: u8 = 0x80;

#[derive(Ord, PartialOrd, Eq, PartialEq, Clone, Copy)]
pub struct VarInt {
    pub value: i32,
}

impl From<usize> for VarInt {
    fn from(value: usize) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl From<i32> for VarInt {
    fn from(value: i32) -> Self {
        Self { value }
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self {
            value: value as i32,
        }
    }
}

impl Display for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[async_trait]
impl ReadProt for VarInt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError> {
        let mut value: i32 = 0;
        let mut pos: u32 = 0;
        let mut current_byte: u8;
        loop {
            let mut buf = [0u8; 1];
            stream.read_exact(&mut buf).await?;
            current_byte = buf[0];
            value |= ((current_byte & SEGMENT_BITS) as i32) << pos;
            if current_byte & CONTINUE_BIT == 0 {
                return Ok(Self { value });
            }
            pos += 7;
            if pos >= 32 {
                return Err(ProtError::VarIntTooBig);
            }
        }
    }
}

#[async_trait]
impl WriteProt for VarInt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        let mut x = self.value as u32;
        loop {
            let mut temp = (x & 0b0111_1111) as u8;
            x >>= 7;
            if x != 0 {
                temp |= 0b1000_0000;
            }

            stream.write_all(&[temp]).await?;

            if x == 0 {
                break;
            }
        }
        Ok(())
    }
}

impl SizedProt for VarInt {
    fn prot_size(&self) -> usize {
        let mut x = self.value as u32;
        let mut count = 0;
        loop {
            x >>= 7;
            count += 1;

            if x == 0 {
                break count;
            }
        }
    }
}

#[inline]
fn u64tou8abe(v: u64) -> [u8; 8] {
    [
        (v >> 56) as u8,
        (v >> 48) as u8,
        (v >> 40) as u8,
        (v >> 32) as u8,
        (v >> 24) as u8,
        (v >> 16) as u8,
        (v >> 8) as u8,
        v as u8,
    ]
}

#[inline]
fn u32tou8abe(v: u32) -> [u8; 4] {
    [(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
}

#[async_trait]
impl ReadProt for u8 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let mut buffer = [0; 1];
        stream.read_exact(&mut buffer).await?;
        Ok(buffer[0])
    }
}

#[async_trait]
impl WriteProt for u8 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        stream.write_all(&[*self]).await?;
        Ok(())
    }
}

impl SizedProt for u8 {
    fn prot_size(&self) -> usize {
        1
    }
}

#[async_trait]
impl ReadProt for bool {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        Ok(u8::read(stream).await? == 0x01)
    }
}

#[async_trait]
impl WriteProt for bool {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        // 0x01 = true, 0x00 = false
        u8::write(&if *self { 0x01 } else { 0x00 }, stream).await
    }
}

impl SizedProt for bool {
    fn prot_size(&self) -> usize {
        1
    }
}

#[async_trait]
impl ReadProt for i16 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        Ok(stream.read_i16().await?)
    }
}

#[async_trait]
impl WriteProt for i16 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        stream.write_i16(*self).await?;
        Ok(())
    }
}

impl SizedProt for i16 {
    fn prot_size(&self) -> usize {
        2
    }
}

#[async_trait]
impl ReadProt for i32 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let mut buffer = [0; 4];
        stream.read_exact(&mut buffer).await?;
        let mut value: u32 = buffer[0] as u32;
        value <<= 8;
        value |= buffer[1] as u32;
        value <<= 8;
        value |= buffer[2] as u32;
        value <<= 8;
        value |= buffer[3] as u32;

        Ok(value as i32)
    }
}

#[async_trait]
impl WriteProt for i32 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        let data = u32tou8abe(*self as u32);
        stream.write_all(&data).await?;
        Ok(())
    }
}

impl SizedProt for i32 {
    fn prot_size(&self) -> usize {
        4
    }
}

#[async_trait]
impl ReadProt for u64 {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let mut buffer = [0; 8];
        stream.read_exact(&mut buffer).await?;
        let mut value: u64 = buffer[0] as u64;
        for b in &buffer[1..] {
            value <<= 8;
            value |= *b as u64;
        }
        Ok(value)
    }
}

#[async_trait]
impl WriteProt for u64 {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        let data = u64tou8abe(*self);
        stream.write_all(&data).await?;
        Ok(())
    }
}

impl SizedProt for u64 {
    fn prot_size(&self) -> usize {
        8
    }
}

/// A VarInt-length-prefixed blob of raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteArray(pub Vec<u8>);

#[async_trait]
impl WriteProt for ByteArray {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        VarInt::from(self.0.len()).write(stream).await?;
        stream.write_all(&self.0).await?;
        Ok(())
    }
}

#[async_trait]
impl ReadProt for ByteArray {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let len = VarInt::read(stream).await?.value;
        if len < 0 {
            return Err(ProtError::Any(format!("Negative byte array length: {len}")));
        }
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf).await?;
        Ok(Self(buf))
    }
}

impl SizedProt for ByteArray {
    fn prot_size(&self) -> usize {
        VarInt::from(self.0.len()).prot_size() + self.0.len()
    }
}

/// A fixed bag of bits packed into 64-bit words, VarInt-length-prefixed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSet(pub Vec<u64>);

impl BitSet {
    /// A zeroed bitset able to hold at least `bits` bits.
    pub fn with_bits(bits: usize) -> Self {
        Self(vec![0; (bits + 63) / 64])
    }

    pub fn get(&self, i: usize) -> bool {
        self.0
            .get(i / 64)
            .is_some_and(|word| word >> (i % 64) & 1 == 1)
    }

    pub fn set(&mut self, i: usize, v: bool) {
        if let Some(word) = self.0.get_mut(i / 64) {
            if v {
                *word |= 1 << (i % 64);
            } else {
                *word &= !(1 << (i % 64));
            }
        }
    }

    /// The word-wise bitwise inverse, as the light payload requires.
    pub fn complement(&self) -> BitSet {
        Self(self.0.iter().map(|word| !word).collect())
    }
}

#[async_trait]
impl WriteProt for BitSet {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        VarInt::from(self.0.len()).write(stream).await?;
        for word in &self.0 {
            word.write(stream).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReadProt for BitSet {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let len = VarInt::read(stream).await?.value;
        if len < 0 {
            return Err(ProtError::Any(format!("Negative bitset length: {len}")));
        }
        let mut words = Vec::with_capacity(len as usize);
        for _ in 0..len {
            words.push(u64::read(stream).await?);
        }
        Ok(Self(words))
    }
}

impl SizedProt for BitSet {
    fn prot_size(&self) -> usize {
        VarInt::from(self.0.len()).prot_size() + self.0.len() * 8
    }
}

/// A VarInt-count-prefixed sequence of wire elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SizedVec<T>
where
    T: Send + Sync,
{
    pub vec: Vec<T>,
}

impl<T> From<Vec<T>> for SizedVec<T>
where
    T: Send + Sync,
{
    fn from(value: Vec<T>) -> Self {
        Self { vec: value }
    }
}

#[async_trait]
impl<T> WriteProt for SizedVec<T>
where
    T: WriteProt + Sync + Send,
{
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtError> {
        VarInt::from(self.vec.len()).write(stream).await?;
        for item in &self.vec {
            item.write(stream).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> ReadProt for SizedVec<T>
where
    T: ReadProt + Sync + Send,
{
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, ProtError>
    where
        Self: Sized,
    {
        let len = VarInt::read(stream).await?.value;
        if len < 0 {
            return Err(ProtError::Any(format!("Negative array length: {len}")));
        }
        let mut vec = Vec::with_capacity(len.min(4096) as usize);
        for _ in 0..len {
            vec.push(T::read(stream).await?);
        }
        Ok(Self { vec })
    }
}

impl<T> SizedProt for SizedVec<T>
where
    T: SizedProt + Send + Sync,
{
    fn prot_size(&self) -> usize {
        VarInt::from(self.vec.len()).prot_size()
            + self.vec.iter().map(|x| x.prot_size()).sum::<usize>()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn varint_0() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: 0 }.write(&mut buf).await?;
        assert_eq!(buf[0], 0);
        Ok(())
    }

    #[tokio::test]
    async fn varint_127() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: 127 }.write(&mut buf).await?;
        assert_eq!(buf[0], 127);
        Ok(())
    }

    #[tokio::test]
    async fn varint_128() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: 128 }.write(&mut buf).await?;
        assert_eq!(buf[0], 128);
        assert_eq!(buf[1], 1);
        Ok(())
    }

    #[tokio::test]
    async fn varint_25565() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: 25565 }.write(&mut buf).await?;
        assert_eq!(buf[0], 221);
        assert_eq!(buf[1], 199);
        assert_eq!(buf[2], 1);
        Ok(())
    }

    #[tokio::test]
    async fn varint_2147483647() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: 2147483647 }.write(&mut buf).await?;
        assert_eq!(buf, vec![255, 255, 255, 255, 7]);
        Ok(())
    }

    #[tokio::test]
    async fn varint_n1() -> Result<(), ProtError> {
        let mut buf: Vec<u8> = vec![];
        VarInt { value: -1 }.write(&mut buf).await?;
        assert_eq!(buf, vec![255, 255, 255, 255, 15]);
        Ok(())
    }

    #[tokio::test]
    async fn varint_roundtrip() -> Result<(), ProtError> {
        for value in [0, 1, 127, 128, 255, 25565, 2097151, i32::MAX, -1, i32::MIN] {
            let mut buf: Vec<u8> = vec![];
            VarInt { value }.write(&mut buf).await?;
            assert_eq!(VarInt::read(&mut buf.as_slice()).await?.value, value);
            assert_eq!(buf.len(), VarInt { value }.prot_size());
        }
        Ok(())
    }

    #[tokio::test]
    async fn byte_array_roundtrip() -> Result<(), ProtError> {
        let arr = ByteArray(vec![1, 2, 3, 255, 0]);
        let mut buf: Vec<u8> = vec![];
        arr.write(&mut buf).await?;
        assert_eq!(buf[0], 5);
        assert_eq!(ByteArray::read(&mut buf.as_slice()).await?, arr);
        Ok(())
    }

    #[tokio::test]
    async fn byte_array_short_read() {
        let mut buf: &[u8] = &[5, 1, 2];
        assert!(ByteArray::read(&mut buf).await.is_err());
    }

    #[test]
    fn bitset_set_get() {
        let mut set = BitSet::with_bits(130);
        assert_eq!(set.0.len(), 3);
        set.set(0, true);
        set.set(64, true);
        set.set(129, true);
        assert!(set.get(0) && set.get(64) && set.get(129));
        assert!(!set.get(1) && !set.get(63) && !set.get(128));
        set.set(64, false);
        assert!(!set.get(64));
        // out of range reads are false
        assert!(!set.get(100000));
    }

    #[test]
    fn bitset_complement() {
        let mut set = BitSet::with_bits(70);
        set.set(3, true);
        set.set(69, true);
        let rev = set.complement();
        for (word, rev_word) in set.0.iter().zip(rev.0.iter()) {
            assert_eq!(!word, *rev_word);
        }
        assert_eq!(rev.complement(), set);
    }

    #[tokio::test]
    async fn bitset_roundtrip() -> Result<(), ProtError> {
        let mut set = BitSet::with_bits(16);
        set.set(2, true);
        set.set(15, true);
        let mut buf: Vec<u8> = vec![];
        set.write(&mut buf).await?;
        assert_eq!(BitSet::read(&mut buf.as_slice()).await?, set);
        Ok(())
    }
}
