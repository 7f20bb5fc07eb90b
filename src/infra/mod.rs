//! Byte-level infrastructure: encoding and decoding of the stuffed wire
//! format exchanged with the gateway board over the serial link.
pub mod codec;
