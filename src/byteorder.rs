pub trait WriteBytesLe {
    fn write_le(&self, dst: &mut Vec<u8>);

    /// Serialized size in bytes.
    fn byte_len(&self) -> usize;
}

macro_rules! impl_num_le {
    ($($t:ty),+) => { $(
        impl WriteBytesLe for $t {
            #[inline]
            fn write_le(&self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_le_bytes()); }
            #[inline]
            fn byte_len(&self) -> usize { size_of::<$t>() }
        }
    )+ }
}

impl_num_le!(u8, i8, u16, i16, u32, i32, u64, i64);

impl<T: WriteBytesLe, const N: usize> WriteBytesLe for [T; N] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }

    fn byte_len(&self) -> usize {
        self.iter().map(WriteBytesLe::byte_len).sum()
    }
}

impl<T: WriteBytesLe> WriteBytesLe for Vec<T> {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }

    fn byte_len(&self) -> usize {
        self.iter().map(WriteBytesLe::byte_len).sum()
    }
}

/// Implements [`WriteBytesLe`] for a fieldless `#[repr(u16)]` enum.
#[macro_export]
macro_rules! impl_u16_enum {
    ($t:ty) => {
        impl $crate::byteorder::WriteBytesLe for $t {
            fn write_le(&self, dst: &mut Vec<u8>) {
                dst.extend_from_slice(&(*self as u16).to_le_bytes())
            }

            fn byte_len(&self) -> usize {
                2
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::byteorder::WriteBytesLe;
    use qdm2d_macros::ToBytes;

    #[repr(u16)]
    #[derive(Clone, Copy)]
    enum Tag {
        Pcm = 1,
    }

    crate::impl_u16_enum!(Tag);

    #[derive(ToBytes)]
    struct Mini {
        tag: Tag,
        a: u16,
        b: u32,
        id: [u8; 4],
    }

    #[derive(ToBytes)]
    struct Empty;

    #[test]
    fn derived_fields_in_order() {
        let s = Mini {
            tag: Tag::Pcm,
            a: 0x1234,
            b: 0xABCDEF01,
            id: *b"TEST",
        };

        let mut vec = Vec::new();
        s.write_le(&mut vec);

        let expected = [
            0x01, 0x00, 0x34, 0x12, 0x01, 0xEF, 0xCD, 0xAB, b'T', b'E', b'S', b'T',
        ];
        assert_eq!(&vec[..], &expected);
        assert_eq!(s.byte_len(), expected.len());
        assert_eq!(Empty.byte_len(), 0);
    }
}
