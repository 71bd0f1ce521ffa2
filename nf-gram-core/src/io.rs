use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Reads a file-open history and returns one path per line.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`, trims surrounding whitespace
/// - Skips blank lines
pub fn read_history<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.map(str::to_owned)
		.collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/history.txt` + `"bin"` → `data/history.bin`
pub fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Writes `bytes` to `path` so that readers see either the old or the new content.
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over `path`. Missing parent directories are created.
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
	let path = path.as_ref();
	let parent = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	fs::create_dir_all(parent)?;

	let temp_file = NamedTempFile::new_in(parent)?;
	{
		let mut writer = BufWriter::new(temp_file.as_file());
		writer.write_all(bytes)?;
		writer.flush()?;
	}
	temp_file.as_file().sync_all()?;
	temp_file.persist(path).map_err(|e| e.error)?;
	Ok(())
}
