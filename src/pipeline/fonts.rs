// src/pipeline/fonts.rs

//! Font pipeline: TTF → WOFF / WOFF2 repackaging.
//!
//! Both web-font formats are containers around the sfnt table structure of
//! the source TTF; no glyph data is reinterpreted. The WOFF container
//! compresses tables individually with zlib, WOFF2 compresses the whole
//! table stream with Brotli (null table transforms, so `glyf`/`loca` are
//! stored verbatim).
//!
//! The conversion is atomic per font file: either every encoder produces an
//! output, or the file is reported failed and nothing is written for it.

use std::io::Write;

use crate::errors::{PipelineError, Result};
use crate::pipeline::{FileData, Transform};

/// One table slice out of a parsed sfnt font.
#[derive(Debug, Clone)]
pub struct SfntTable {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub offset: usize,
    pub length: usize,
}

/// Parsed sfnt structure: flavor plus table directory, tables sorted by tag.
#[derive(Debug)]
pub struct SfntFont<'a> {
    pub flavor: u32,
    pub tables: Vec<SfntTable>,
    raw: &'a [u8],
}

const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_CFF: u32 = u32::from_be_bytes(*b"OTTO");

impl<'a> SfntFont<'a> {
    /// Parse the table directory of a TTF/OTF, validating every table's
    /// bounds against the input.
    pub fn parse(raw: &'a [u8]) -> std::result::Result<Self, String> {
        let flavor = read_u32(raw, 0).ok_or("font shorter than its sfnt header")?;
        if flavor != SFNT_TRUETYPE && flavor != SFNT_CFF {
            return Err(format!("not an sfnt font (version 0x{flavor:08X})"));
        }

        let num_tables = read_u16(raw, 4).ok_or("truncated sfnt header")? as usize;
        if num_tables == 0 {
            return Err("font has no tables".to_string());
        }

        let mut tables = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let rec = 12 + i * 16;
            let tag_bytes = raw
                .get(rec..rec + 4)
                .ok_or("truncated table directory")?;
            let checksum = read_u32(raw, rec + 4).ok_or("truncated table directory")?;
            let offset = read_u32(raw, rec + 8).ok_or("truncated table directory")? as usize;
            let length = read_u32(raw, rec + 12).ok_or("truncated table directory")? as usize;

            if offset.checked_add(length).is_none_or(|end| end > raw.len()) {
                let tag = String::from_utf8_lossy(tag_bytes).into_owned();
                return Err(format!("table '{tag}' extends past end of file"));
            }

            let mut tag = [0u8; 4];
            tag.copy_from_slice(tag_bytes);
            tables.push(SfntTable {
                tag,
                checksum,
                offset,
                length,
            });
        }

        tables.sort_by_key(|t| t.tag);

        Ok(Self {
            flavor,
            tables,
            raw,
        })
    }

    pub fn table_data(&self, table: &SfntTable) -> &'a [u8] {
        &self.raw[table.offset..table.offset + table.length]
    }

    /// Size of the font rebuilt as an uncompressed sfnt, with tables padded
    /// to four bytes. Both containers record this for the decoder.
    fn total_sfnt_size(&self) -> u32 {
        let tables: usize = self.tables.iter().map(|t| pad4(t.length)).sum();
        (12 + self.tables.len() * 16 + tables) as u32
    }
}

/// One target web-font format.
pub trait FontEncoder: Send + Sync {
    fn extension(&self) -> &'static str;

    fn encode(&self, font: &SfntFont<'_>) -> std::result::Result<Vec<u8>, String>;
}

/// WOFF 1.0: per-table zlib compression.
pub struct WoffEncoder;

impl FontEncoder for WoffEncoder {
    fn extension(&self) -> &'static str {
        "woff"
    }

    fn encode(&self, font: &SfntFont<'_>) -> std::result::Result<Vec<u8>, String> {
        let num_tables = font.tables.len();
        let header_len = 44;
        let dir_len = num_tables * 20;

        // Compress each table; keep the raw bytes when zlib doesn't help.
        let mut blobs = Vec::with_capacity(num_tables);
        for table in &font.tables {
            let data = font.table_data(table);
            let compressed = zlib_compress(data)?;
            if compressed.len() < data.len() {
                blobs.push(compressed);
            } else {
                blobs.push(data.to_vec());
            }
        }

        let data_len: usize = blobs.iter().map(|b| pad4(b.len())).sum();
        let total_len = (header_len + dir_len + data_len) as u32;

        let mut out = Vec::with_capacity(total_len as usize);
        out.extend_from_slice(b"wOFF");
        push_u32(&mut out, font.flavor);
        push_u32(&mut out, total_len);
        push_u16(&mut out, num_tables as u16);
        push_u16(&mut out, 0); // reserved
        push_u32(&mut out, font.total_sfnt_size());
        push_u16(&mut out, 1); // majorVersion
        push_u16(&mut out, 0); // minorVersion
        push_u32(&mut out, 0); // metaOffset
        push_u32(&mut out, 0); // metaLength
        push_u32(&mut out, 0); // metaOrigLength
        push_u32(&mut out, 0); // privOffset
        push_u32(&mut out, 0); // privLength

        let mut offset = header_len + dir_len;
        for (table, blob) in font.tables.iter().zip(&blobs) {
            out.extend_from_slice(&table.tag);
            push_u32(&mut out, offset as u32);
            push_u32(&mut out, blob.len() as u32);
            push_u32(&mut out, table.length as u32);
            push_u32(&mut out, table.checksum);
            offset += pad4(blob.len());
        }

        for blob in &blobs {
            out.extend_from_slice(blob);
            out.resize(pad4(out.len()), 0);
        }

        Ok(out)
    }
}

/// WOFF 2.0: whole-stream Brotli compression, null table transforms.
pub struct Woff2Encoder;

impl FontEncoder for Woff2Encoder {
    fn extension(&self) -> &'static str {
        "woff2"
    }

    fn encode(&self, font: &SfntFont<'_>) -> std::result::Result<Vec<u8>, String> {
        // Table directory: arbitrary-tag flag (63) for every table; the
        // null transform for glyf/loca is version 3, everything else 0.
        let mut directory = Vec::new();
        let mut stream = Vec::new();
        for table in &font.tables {
            let null_transform = if matches!(&table.tag, b"glyf" | b"loca") {
                3u8 << 6
            } else {
                0
            };
            directory.push(0x3F | null_transform);
            directory.extend_from_slice(&table.tag);
            push_base128(&mut directory, table.length as u32);
            stream.extend_from_slice(font.table_data(table));
        }

        let compressed = brotli_compress(&stream)?;

        let header_len = 48;
        let mut total_len = header_len + directory.len() + compressed.len();
        total_len = pad4(total_len);

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(b"wOF2");
        push_u32(&mut out, font.flavor);
        push_u32(&mut out, total_len as u32);
        push_u16(&mut out, font.tables.len() as u16);
        push_u16(&mut out, 0); // reserved
        push_u32(&mut out, font.total_sfnt_size());
        push_u32(&mut out, compressed.len() as u32);
        push_u16(&mut out, 1); // majorVersion
        push_u16(&mut out, 0); // minorVersion
        push_u32(&mut out, 0); // metaOffset
        push_u32(&mut out, 0); // metaLength
        push_u32(&mut out, 0); // metaOrigLength
        push_u32(&mut out, 0); // privOffset
        push_u32(&mut out, 0); // privLength
        out.extend_from_slice(&directory);
        out.extend_from_slice(&compressed);
        out.resize(pad4(out.len()), 0);

        Ok(out)
    }
}

/// Fan a source font out through every configured encoder.
///
/// All conversions must succeed for the file to produce any output at all.
pub struct FontConvert {
    encoders: Vec<Box<dyn FontEncoder>>,
}

impl FontConvert {
    pub fn new(encoders: Vec<Box<dyn FontEncoder>>) -> Self {
        Self { encoders }
    }

    /// The production pair: WOFF + WOFF2.
    pub fn woff_pair() -> Self {
        Self::new(vec![Box::new(WoffEncoder), Box::new(Woff2Encoder)])
    }
}

impl Transform for FontConvert {
    fn name(&self) -> &'static str {
        "font-convert"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let font = SfntFont::parse(&input.contents)
            .map_err(|reason| PipelineError::transform(&input.rel_path, reason))?;

        let mut outputs = Vec::with_capacity(self.encoders.len());
        for encoder in &self.encoders {
            let encoded = encoder.encode(&font).map_err(|reason| {
                PipelineError::transform(
                    &input.rel_path,
                    format!("{} conversion failed: {reason}", encoder.extension()),
                )
            })?;
            outputs.push(input.with_extension(encoder.extension(), encoded));
        }

        Ok(outputs)
    }
}

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// UIntBase128: 7 bits per byte, most significant first, high bit set on
/// every byte except the last.
fn push_base128(out: &mut Vec<u8>, mut v: u32) {
    let mut bytes = [0u8; 5];
    let mut n = 0;
    loop {
        bytes[n] = (v & 0x7F) as u8;
        v >>= 7;
        n += 1;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(bytes[i] | continuation);
    }
}

fn zlib_compress(data: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    enc.write_all(data).map_err(|e| e.to_string())?;
    enc.finish().map_err(|e| e.to_string())
}

fn brotli_compress(data: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 11, 22);
        writer.write_all(data).map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| e.to_string())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    /// Build a syntactically valid TTF with the given tables.
    fn fake_ttf(tables: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let num = tables.len();
        let mut out = Vec::new();
        push_u32(&mut out, SFNT_TRUETYPE);
        push_u16(&mut out, num as u16);
        // searchRange / entrySelector / rangeShift: not read by the parser.
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);

        let mut offset = 12 + num * 16;
        for (tag, data) in tables {
            out.extend_from_slice(*tag);
            push_u32(&mut out, 0xDEAD_BEEF); // checksum carried verbatim
            push_u32(&mut out, offset as u32);
            push_u32(&mut out, data.len() as u32);
            offset += pad4(data.len());
        }
        for (_, data) in tables {
            out.extend_from_slice(data);
            out.resize(pad4(out.len()), 0);
        }
        out
    }

    fn sample_ttf() -> Vec<u8> {
        fake_ttf(&[
            (b"cmap", b"the cmap table contents go here"),
            (b"glyf", b"glyph outlines, repeated to make zlib useful: aaaaaaaaaaaaaaaa"),
            (b"head", b"head!"),
        ])
    }

    #[test]
    fn parse_rejects_garbage_and_truncation() {
        assert!(SfntFont::parse(b"not a font").is_err());
        assert!(SfntFont::parse(&[]).is_err());

        let mut truncated = sample_ttf();
        truncated.truncate(20);
        assert!(SfntFont::parse(&truncated).is_err());
    }

    #[test]
    fn parse_rejects_out_of_bounds_tables() {
        let mut ttf = sample_ttf();
        let len = ttf.len();
        ttf.truncate(len - 4);
        assert!(SfntFont::parse(&ttf).is_err());
    }

    #[test]
    fn woff_round_trips_the_table_directory() {
        let ttf = sample_ttf();
        let font = SfntFont::parse(&ttf).unwrap();
        let woff = WoffEncoder.encode(&font).unwrap();

        assert_eq!(&woff[..4], b"wOFF");
        assert_eq!(read_u32(&woff, 4).unwrap(), SFNT_TRUETYPE);
        assert_eq!(read_u32(&woff, 8).unwrap() as usize, woff.len());
        assert_eq!(read_u16(&woff, 12).unwrap(), 3);

        // Walk the directory and check every table decompresses back to the
        // original bytes.
        for i in 0..3 {
            let rec = 44 + i * 20;
            let tag: [u8; 4] = woff[rec..rec + 4].try_into().unwrap();
            let offset = read_u32(&woff, rec + 4).unwrap() as usize;
            let comp_len = read_u32(&woff, rec + 8).unwrap() as usize;
            let orig_len = read_u32(&woff, rec + 12).unwrap() as usize;

            let table = font.tables.iter().find(|t| t.tag == tag).unwrap();
            assert_eq!(orig_len, table.length);

            let blob = &woff[offset..offset + comp_len];
            let restored = if comp_len < orig_len {
                let mut buf = Vec::new();
                flate2::read::ZlibDecoder::new(blob)
                    .read_to_end(&mut buf)
                    .unwrap();
                buf
            } else {
                blob.to_vec()
            };
            assert_eq!(restored, font.table_data(table));
        }
    }

    #[test]
    fn woff2_round_trips_the_table_stream() {
        let ttf = sample_ttf();
        let font = SfntFont::parse(&ttf).unwrap();
        let woff2 = Woff2Encoder.encode(&font).unwrap();

        assert_eq!(&woff2[..4], b"wOF2");
        assert_eq!(read_u16(&woff2, 12).unwrap(), 3);
        let compressed_len = read_u32(&woff2, 20).unwrap() as usize;

        // Directory: flags(1) + tag(4) + base128 length per table. All our
        // sample table lengths fit in one base128 byte.
        let mut at = 48;
        let mut expected_stream = Vec::new();
        for table in &font.tables {
            let flags = woff2[at];
            assert_eq!(flags & 0x3F, 0x3F);
            if &table.tag == b"glyf" || &table.tag == b"loca" {
                assert_eq!(flags >> 6, 3);
            } else {
                assert_eq!(flags >> 6, 0);
            }
            assert_eq!(&woff2[at + 1..at + 5], &table.tag);
            assert_eq!(woff2[at + 5] as usize, table.length);
            at += 6;
            expected_stream.extend_from_slice(font.table_data(table));
        }

        let mut restored = Vec::new();
        brotli::Decompressor::new(&woff2[at..at + compressed_len], 4096)
            .read_to_end(&mut restored)
            .unwrap();
        assert_eq!(restored, expected_stream);
    }

    #[test]
    fn convert_produces_both_formats_or_nothing() {
        let ttf = sample_ttf();
        let input = FileData::new("fonts/Roboto.ttf", ttf);
        let out = FontConvert::woff_pair().apply(&input).unwrap();

        assert_eq!(out.len(), 2);
        let exts: Vec<_> = out
            .iter()
            .map(|f| f.rel_path.extension().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(exts, vec!["woff", "woff2"]);

        let bad = FileData::new("fonts/Broken.ttf", b"junk".to_vec());
        let err = FontConvert::woff_pair().apply(&bad).unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[test]
    fn base128_encodes_boundary_values() {
        let cases = [(0u32, vec![0u8]), (127, vec![0x7F]), (128, vec![0x81, 0x00]), (16384, vec![0x81, 0x80, 0x00])];
        for (value, expected) in cases {
            let mut out = Vec::new();
            push_base128(&mut out, value);
            assert_eq!(out, expected, "value {value}");
        }
    }
}
