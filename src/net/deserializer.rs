use bytes::Buf;
use serde::{
    de::{
        value::U32Deserializer, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess,
        SeqAccess, VariantAccess, Visitor,
    },
    Deserializer,
};

use crate::error::EncodingError;

/// Reads values written by [`PayloadSerializer`](super::serializer::PayloadSerializer)
pub struct PayloadDeserializer<B: Buf> {
    pub input: B,
    pub consumed: usize,
}

impl<B: Buf> PayloadDeserializer<B> {
    fn need(&mut self, len: usize) -> Result<(), EncodingError> {
        let available = self.input.remaining();
        if available < len {
            return Err(EncodingError::NotEnoughData(len, available));
        }
        self.consumed += len;
        Ok(())
    }

    fn take_u8(&mut self) -> Result<u8, EncodingError> {
        self.need(1)?;
        Ok(self.input.get_u8())
    }

    fn take_u16(&mut self) -> Result<u16, EncodingError> {
        self.need(2)?;
        Ok(self.input.get_u16())
    }

    fn take_len(&mut self) -> Result<usize, EncodingError> {
        Ok(self.take_u16()?.into())
    }

    fn take_bytes(&mut self) -> Result<Vec<u8>, EncodingError> {
        let len = self.take_len()?;
        self.need(len)?;
        let mut data = vec![0; len];
        self.input.copy_to_slice(&mut data);
        Ok(data)
    }
}

macro_rules! take_primitive {
    ($($method:ident => $visit:ident, $get:ident, $size:expr;)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                self.need($size)?;
                visitor.$visit(self.input.$get())
            }
        )*
    };
}

impl<'de, 'a, B: Buf> Deserializer<'de> for &'a mut PayloadDeserializer<B> {
    type Error = EncodingError;

    take_primitive! {
        deserialize_i8 => visit_i8, get_i8, 1;
        deserialize_i16 => visit_i16, get_i16, 2;
        deserialize_i32 => visit_i32, get_i32, 4;
        deserialize_i64 => visit_i64, get_i64, 8;
        deserialize_u8 => visit_u8, get_u8, 1;
        deserialize_u16 => visit_u16, get_u16, 2;
        deserialize_u32 => visit_u32, get_u32, 4;
        deserialize_u64 => visit_u64, get_u64, 8;
        deserialize_f32 => visit_f32, get_f32, 4;
        deserialize_f64 => visit_f64, get_f64, 8;
    }

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(EncodingError::Unsupported("payload format is not self-describing"))
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bool(self.take_u8()? != 0)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.need(4)?;
        let c = char::from_u32(self.input.get_u32())
            .ok_or_else(|| EncodingError::Custom("invalid char".to_string()))?;
        visitor.visit_char(c)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let data = self.take_bytes()?;
        let s = std::str::from_utf8(&data)?;
        visitor.visit_string(s.to_owned())
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_byte_buf(self.take_bytes()?)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.take_u8()? {
            0 => visitor.visit_none(),
            1 => visitor.visit_some(self),
            tag => Err(EncodingError::InvalidOption(tag)),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let len = self.take_len()?;
        visitor.visit_seq(Access {
            deserializer: self,
            len,
        })
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(Access {
            deserializer: self,
            len,
        })
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let len = self.take_len()?;
        visitor.visit_map(Access {
            deserializer: self,
            len,
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(fields.len(), visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(self)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u32(self.take_u16()?.into())
    }

    fn deserialize_ignored_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(EncodingError::Unsupported("cannot skip values without a schema"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

struct Access<'a, B: Buf> {
    deserializer: &'a mut PayloadDeserializer<B>,
    len: usize,
}

impl<'a, 'de: 'a, B: Buf> SeqAccess<'de> for Access<'a, B> {
    type Error = EncodingError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        seed.deserialize(&mut *self.deserializer).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

impl<'a, 'de: 'a, B: Buf> MapAccess<'de> for Access<'a, B> {
    type Error = EncodingError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        seed.deserialize(&mut *self.deserializer).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.deserializer)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}

impl<'de, 'a, B: Buf> EnumAccess<'de> for &'a mut PayloadDeserializer<B> {
    type Error = EncodingError;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let index: U32Deserializer<EncodingError> = u32::from(self.take_u16()?).into_deserializer();
        let value = seed.deserialize(index)?;
        Ok((value, self))
    }
}

impl<'de, 'a, B: Buf> VariantAccess<'de> for &'a mut PayloadDeserializer<B> {
    type Error = EncodingError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(fields.len(), visitor)
    }
}
