use std::path::Path;

use image::ImageFormat;

const PDF_MAGIC: &[u8] = b"%PDF-";
const OCTET_STREAM: &str = "application/octet-stream";

/// A schedule file ready to be sent to an OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Wrap in-memory bytes, sniffing the content type.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = detect_content_type(&file_name, &bytes).to_string();
        Self { file_name, content_type, bytes }
    }

    /// Read a file from disk.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Magic numbers first, then the file extension.
pub fn detect_content_type(file_name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(PDF_MAGIC) {
        return "application/pdf";
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some(ext) => ImageFormat::from_extension(ext)
            .map(|f| f.to_mime_type())
            .unwrap_or(OCTET_STREAM),
        None => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn sniffs_png_regardless_of_name() {
        assert_eq!(detect_content_type("schedule.dat", &tiny_png()), "image/png");
    }

    #[test]
    fn sniffs_pdf_header() {
        assert_eq!(detect_content_type("week.bin", b"%PDF-1.7\n..."), "application/pdf");
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(detect_content_type("week.JPG", b"not really"), "image/jpeg");
        assert_eq!(detect_content_type("week.pdf", b""), "application/pdf");
        assert_eq!(detect_content_type("week.xyz", b""), OCTET_STREAM);
        assert_eq!(detect_content_type("week", b""), OCTET_STREAM);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.png");
        tokio::fs::write(&path, tiny_png()).await.unwrap();

        let upload = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "schedule.png");
        assert_eq!(upload.content_type, "image/png");
        assert!(!upload.is_empty());
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadFile::from_path(&dir.path().join("nope.png")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
