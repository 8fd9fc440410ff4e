pub mod deserializer;
pub mod memory;
pub mod sequence;
pub mod serializer;
pub mod transport;
