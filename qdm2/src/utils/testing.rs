//! Bit writer and packet builder for unit tests.

use crate::structs::config::StreamConfig;
use crate::structs::sub_packet::{TYPE_FLAG_LONG, TYPE_TERMINATOR};
use crate::utils::checksum::{Algorithm, Checksum16};
use crate::utils::vlc::Vlc;

/// MSB-first bit writer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn put_bit(&mut self, bit: bool) {
        if self.bits % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
    }

    pub fn put(&mut self, value: u32, n: u32) {
        for i in (0..n).rev() {
            self.put_bit((value >> i) & 1 != 0);
        }
    }

    pub fn put_vlc(&mut self, vlc: &Vlc, symbol: i32) {
        let (code, len) = vlc
            .encode(symbol)
            .unwrap_or_else(|| panic!("symbol {symbol} not in {}", vlc.name()));
        self.put(code, len);
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Assembles a packet of a fixed size with a valid checksum.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    frame_size: usize,
    header_type: u8,
    header_payload: Vec<u8>,
    sub_packets: Vec<(u8, Vec<u8>)>,
}

impl PacketBuilder {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            header_type: 0,
            header_payload: Vec::new(),
            sub_packets: Vec::new(),
        }
    }

    pub fn header(mut self, header_type: u8, payload: &[u8]) -> Self {
        self.header_type = header_type;
        self.header_payload = payload.to_vec();
        self
    }

    pub fn sub_packet(mut self, type_code: u8, payload: Vec<u8>) -> Self {
        self.sub_packets.push((type_code, payload));
        self
    }

    /// Packet body without the checksum trailer.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.frame_size);
        push_sub_packet(&mut body, self.header_type, &self.header_payload);
        for (code, payload) in &self.sub_packets {
            push_sub_packet(&mut body, *code, payload);
        }

        let body_len = self.frame_size - 2;
        assert!(body.len() <= body_len, "sub-packets exceed the packet size");
        if body.len() < body_len {
            body.push(TYPE_TERMINATOR);
        }
        body.resize(body_len, 0);
        body
    }

    pub fn build(&self) -> Vec<u8> {
        let mut packet = self.body();
        let checksum = Algorithm::for_header(self.header_type)
            .map(|alg| Checksum16::new(&alg).checksum(&packet))
            .unwrap_or(0);
        packet.extend_from_slice(&checksum.to_be_bytes());
        packet
    }
}

fn push_sub_packet(body: &mut Vec<u8>, type_code: u8, payload: &[u8]) {
    if payload.len() > 0xFF {
        body.push(type_code | TYPE_FLAG_LONG);
        body.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        body.push(type_code);
        body.push(payload.len() as u8);
    }
    body.extend_from_slice(payload);
}

/// Extradata for the given stream parameters.
pub fn extradata(channels: u32, sample_rate: u32, samples_per_frame: u32, frame_size: u32) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&12u32.to_be_bytes());
    blob.extend_from_slice(b"frma");
    blob.extend_from_slice(b"QDM2");
    blob.extend_from_slice(&36u32.to_be_bytes());
    blob.extend_from_slice(b"QDCA");
    for value in [
        1,
        channels,
        sample_rate,
        (frame_size as u64 * 8 * sample_rate as u64 / samples_per_frame as u64) as u32,
        frame_size,
        frame_size,
        samples_per_frame,
    ] {
        blob.extend_from_slice(&value.to_be_bytes());
    }
    blob.extend_from_slice(&8u32.to_be_bytes());
    blob.extend_from_slice(&[0; 4]);
    blob
}

pub fn config(channels: u32, sample_rate: u32, samples_per_frame: u32, frame_size: u32) -> StreamConfig {
    StreamConfig::from_extradata(&extradata(channels, sample_rate, samples_per_frame, frame_size))
        .unwrap()
}

#[test]
fn writer_matches_reader() {
    use crate::utils::bitstream_io::BsIoSliceReader;

    let mut writer = BitWriter::default();
    writer.put(0b101, 3);
    writer.put(0x1234, 16);
    writer.put_bit(true);
    assert_eq!(writer.bit_len(), 20);

    let bytes = writer.into_bytes();
    assert_eq!(bytes.len(), 3);
    let mut reader = BsIoSliceReader::from_slice(&bytes);
    assert_eq!(reader.get_n::<u8>(3).unwrap(), 0b101);
    assert_eq!(reader.get_n::<u16>(16).unwrap(), 0x1234);
    assert!(reader.get().unwrap());
}
