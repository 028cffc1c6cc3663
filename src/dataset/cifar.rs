//! CIFAR-10 dataset loader
//!
//! Reads the binary distribution (`cifar-10-batches-bin`): five training batch
//! files and one test batch file, 10 000 records each. A record is one label
//! byte followed by 1024 red, 1024 green and 1024 blue bytes (planar, row-major).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::dataset::class_name;
use crate::utils::error::{Cifar10Error, Result};
use crate::{CHANNELS, IMAGE_SIZE, NUM_CLASSES};

/// Bytes of pixel data per image (32 * 32 * 3)
pub const PIXELS_PER_IMAGE: usize = IMAGE_SIZE * IMAGE_SIZE * CHANNELS;

/// Bytes per record: label + pixels
pub const RECORD_SIZE: usize = 1 + PIXELS_PER_IMAGE;

pub const DOWNLOAD_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";

const ARCHIVE_NAME: &str = "cifar-10-binary.tar.gz";
const EXTRACTED_DIR: &str = "cifar-10-batches-bin";
const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILE: &str = "test_batch.bin";

/// Single CIFAR-10 image with its label
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cifar10Image {
    /// Interleaved RGB pixels in row-major HWC order (3072 values)
    pub pixels: Vec<u8>,
    /// Class label (0-9)
    pub label: u8,
}

impl Cifar10Image {
    pub fn new(pixels: Vec<u8>, label: u8) -> Self {
        Self { pixels, label }
    }

    /// Class name, or `"?"` for a label outside 0-9
    pub fn class_name(&self) -> &'static str {
        class_name(self.label as usize).unwrap_or("?")
    }

    /// `[r, g, b]` at column `x`, row `y`
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * IMAGE_SIZE + x) * CHANNELS;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }
}

/// Parse one batch file's bytes into images.
///
/// `source` is only used in error messages.
pub fn parse_batch(bytes: &[u8], source: &Path) -> Result<Vec<Cifar10Image>> {
    if bytes.is_empty() || bytes.len() % RECORD_SIZE != 0 {
        return Err(Cifar10Error::MalformedBatch(
            source.to_path_buf(),
            format!(
                "length {} is not a non-zero multiple of the record size {}",
                bytes.len(),
                RECORD_SIZE
            ),
        ));
    }

    let plane = IMAGE_SIZE * IMAGE_SIZE;
    bytes
        .chunks_exact(RECORD_SIZE)
        .enumerate()
        .map(|(index, record)| {
            let label = record[0];
            if label as usize >= NUM_CLASSES {
                return Err(Cifar10Error::MalformedBatch(
                    source.to_path_buf(),
                    format!("record {} has label {}", index, label),
                ));
            }

            // Planar R..R G..G B..B -> interleaved RGB
            let planes = &record[1..];
            let mut pixels = vec![0u8; PIXELS_PER_IMAGE];
            for i in 0..plane {
                pixels[i * 3] = planes[i];
                pixels[i * 3 + 1] = planes[plane + i];
                pixels[i * 3 + 2] = planes[2 * plane + i];
            }

            Ok(Cifar10Image::new(pixels, label))
        })
        .collect()
}

/// Load a single batch file
pub fn load_batch_file(path: &Path) -> Result<Vec<Cifar10Image>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Cifar10Error::PathNotFound(path.to_path_buf()),
        _ => Cifar10Error::Io(e),
    })?;
    let images = parse_batch(&bytes, path)?;
    debug!("Loaded {} images from {}", images.len(), path.display());
    Ok(images)
}

/// The full CIFAR-10 train/test pair
#[derive(Clone, Debug)]
pub struct Cifar10Dataset {
    pub train: Vec<Cifar10Image>,
    pub test: Vec<Cifar10Image>,
}

impl Cifar10Dataset {
    /// Load from `dir`, which may either contain the batch files directly or
    /// hold the extracted `cifar-10-batches-bin` directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let batches_dir = resolve_batches_dir(dir.as_ref())?;
        info!("Loading CIFAR-10 from {}", batches_dir.display());

        let mut train = Vec::with_capacity(50_000);
        for file in TRAIN_FILES {
            train.extend(load_batch_file(&batches_dir.join(file))?);
        }
        let test = load_batch_file(&batches_dir.join(TEST_FILE))?;

        info!("Loaded {} training and {} test images", train.len(), test.len());
        Ok(Self { train, test })
    }

    /// Download and extract the binary distribution into `dir`.
    ///
    /// Steps that were already completed (archive present, already extracted)
    /// are skipped. Returns the directory holding the batch files.
    pub fn download(dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let extracted = dir.join(EXTRACTED_DIR);
        if extracted.join(TEST_FILE).exists() {
            info!("CIFAR-10 already extracted at {}", extracted.display());
            return Ok(extracted);
        }

        let archive = dir.join(ARCHIVE_NAME);
        if archive.exists() {
            info!("CIFAR-10 archive already present, skipping download");
        } else {
            info!("Downloading CIFAR-10 from {}", DOWNLOAD_URL);
            let response = reqwest::blocking::get(DOWNLOAD_URL)
                .and_then(|r| r.error_for_status())
                .map_err(|e| Cifar10Error::Download(e.to_string()))?;
            let bytes = response
                .bytes()
                .map_err(|e| Cifar10Error::Download(e.to_string()))?;
            write_complete(&archive, &bytes)?;
            info!("Downloaded {} bytes", bytes.len());
        }

        info!("Extracting {}", archive.display());
        let decoder = flate2::read::GzDecoder::new(File::open(&archive)?);
        tar::Archive::new(decoder)
            .unpack(dir)
            .map_err(|e| Cifar10Error::Download(format!("failed to extract archive: {}", e)))?;

        Ok(extracted)
    }

    pub fn train_distribution(&self) -> [usize; NUM_CLASSES] {
        class_distribution(&self.train)
    }

    pub fn test_distribution(&self) -> [usize; NUM_CLASSES] {
        class_distribution(&self.test)
    }
}

/// Number of images per class
pub fn class_distribution(images: &[Cifar10Image]) -> [usize; NUM_CLASSES] {
    let mut counts = [0; NUM_CLASSES];
    for img in images {
        if let Some(count) = counts.get_mut(img.label as usize) {
            *count += 1;
        }
    }
    counts
}

/// Write `bytes` to `path` through a `.part` sibling, so `path` only exists
/// once the whole file is on disk
fn write_complete(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = File::create(&partial).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    fs::rename(&partial, path)?;
    Ok(())
}

fn resolve_batches_dir(dir: &Path) -> Result<PathBuf> {
    if dir.join(TEST_FILE).exists() {
        return Ok(dir.to_path_buf());
    }
    let nested = dir.join(EXTRACTED_DIR);
    if nested.join(TEST_FILE).exists() {
        return Ok(nested);
    }
    Err(Cifar10Error::PathNotFound(dir.join(TEST_FILE)))
}
