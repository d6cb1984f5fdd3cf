//! Output destinations: standard output, a file (gzip-compressed when the
//! name ends in `.gz`) or a TCP socket.

use crate::error::FetchError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufWriter, Stdout, Write};
use std::net::TcpStream;
use std::path::PathBuf;

/// Where report lines are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
    /// `host:port` of a listening TCP socket
    Socket(String),
}

impl OutputTarget {
    pub fn open(&self) -> Result<ReportWriter, FetchError> {
        match self {
            OutputTarget::Stdout => Ok(ReportWriter::Stdout(BufWriter::new(io::stdout()))),
            OutputTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let file = BufWriter::new(File::create(path)?);
                if path.extension().map_or(false, |ext| ext == "gz") {
                    Ok(ReportWriter::Gzip(GzEncoder::new(file, Compression::default())))
                } else {
                    Ok(ReportWriter::File(file))
                }
            }
            OutputTarget::Socket(addr) => {
                let stream = TcpStream::connect(addr.as_str())?;
                Ok(ReportWriter::Socket(BufWriter::new(stream)))
            }
        }
    }
}

/// Writer behind an [`OutputTarget`].
///
/// Call [`ReportWriter::close`] when done; for gzip output it writes the
/// stream trailer.
#[derive(Debug)]
pub enum ReportWriter {
    Stdout(BufWriter<Stdout>),
    File(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Socket(BufWriter<TcpStream>),
}

impl ReportWriter {
    pub fn close(self) -> Result<(), FetchError> {
        match self {
            ReportWriter::Stdout(mut w) => w.flush()?,
            ReportWriter::File(mut w) => w.flush()?,
            ReportWriter::Gzip(encoder) => encoder.finish()?.flush()?,
            ReportWriter::Socket(mut w) => w.flush()?,
        }
        Ok(())
    }
}

impl Write for ReportWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ReportWriter::Stdout(w) => w.write(buf),
            ReportWriter::File(w) => w.write(buf),
            ReportWriter::Gzip(w) => w.write(buf),
            ReportWriter::Socket(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ReportWriter::Stdout(w) => w.flush(),
            ReportWriter::File(w) => w.flush(),
            ReportWriter::Gzip(w) => w.flush(),
            ReportWriter::Socket(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::{BufRead, BufReader, Read};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_plain_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/gaps.txt");

        let mut writer = OutputTarget::File(path.clone()).open().unwrap();
        writeln!(writer, "line one").unwrap();
        writer.close().unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "line one\n");
    }

    #[test]
    fn test_gz_suffix_compresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.txt.gz");

        let mut writer = OutputTarget::File(path.clone()).open().unwrap();
        assert!(matches!(writer, ReportWriter::Gzip(_)));
        writeln!(writer, "compressed").unwrap();
        writer.close().unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "compressed\n");
    }

    #[test]
    fn test_socket_output() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reader = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).unwrap();
            line
        });

        let mut writer = OutputTarget::Socket(addr).open().unwrap();
        writeln!(writer, "over the wire").unwrap();
        writer.close().unwrap();

        assert_eq!(reader.join().unwrap(), "over the wire\n");
    }

    #[test]
    fn test_unreachable_socket_is_an_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(
            OutputTarget::Socket(addr).open(),
            Err(FetchError::Io(_))
        ));
    }
}
