//! sixel - Encode and decode SIXEL graphics
//!
//! A command-line tool for converting images to/from SIXEL format.

use clap::{Parser, Subcommand};
use sixel_codec::{sixel_decode, sixel_encode, EncodeOptions};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sixel")]
#[command(version)]
#[command(about = "Encode and decode SIXEL graphics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image to SIXEL format
    Encode {
        /// Input image file (PNG, JPEG, GIF, WebP)
        input: PathBuf,

        /// Output SIXEL file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of colors (2-256)
        #[arg(short, long, default_value = "256")]
        colors: u16,

        /// Use 8-bit DCS/ST control bytes instead of ESC sequences
        #[arg(long)]
        eight_bit: bool,
    },

    /// Decode a SIXEL file to PNG
    Decode {
        /// Input SIXEL file (use - for stdin)
        input: PathBuf,

        /// Output PNG file (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display an image as SIXEL in the terminal
    Show {
        /// Input image file (PNG, JPEG, GIF, WebP)
        input: PathBuf,

        /// Maximum number of colors (2-256)
        #[arg(short, long, default_value = "256")]
        colors: u16,
    },
}

fn load_rgba(input: &Path) -> Result<(Vec<u8>, usize, usize), Box<dyn std::error::Error>> {
    let img = image::open(input).map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
    let rgba_img = img.to_rgba8();
    let (width, height) = rgba_img.dimensions();
    Ok((rgba_img.into_raw(), width as usize, height as usize))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            colors,
            eight_bit,
        } => {
            let (pixels, width, height) = load_rgba(&input)?;

            eprintln!(
                "Encoding '{}' ({}x{}) with {} colors",
                input.display(),
                width,
                height,
                colors.clamp(2, 256),
            );

            let opts = EncodeOptions {
                max_colors: colors.clamp(2, 256),
                use_8bit_controls: eight_bit,
            };

            let sixel = sixel_encode(&pixels, width, height, &opts)?;

            match output {
                Some(path) => {
                    fs::write(&path, &sixel)?;
                    eprintln!("Written {} bytes to '{}'", sixel.len(), path.display());
                }
                None => {
                    io::stdout().lock().write_all(&sixel)?;
                }
            }
        }

        Commands::Decode { input, output } => {
            let from_stdin = input.as_os_str() == "-";
            let sixel_data = if from_stdin {
                let mut buf = Vec::new();
                io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                fs::read(&input).map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?
            };

            log::info!("decoding {} bytes", sixel_data.len());

            let decoded = sixel_decode(&sixel_data)?;
            if !decoded.aspect_ratio.is_square() {
                log::warn!(
                    "pixel aspect {}:{} is not applied to the PNG",
                    decoded.aspect_ratio.pan,
                    decoded.aspect_ratio.pad
                );
            }

            let output_path = match output {
                Some(path) => path,
                None if from_stdin => PathBuf::from("decoded.png"),
                None => input.with_extension("png"),
            };

            let img = image::RgbaImage::from_raw(
                decoded.width as u32,
                decoded.height as u32,
                decoded.to_rgba(),
            )
            .ok_or("Failed to create image from decoded data")?;
            img.save(&output_path)?;

            eprintln!(
                "Decoded: {}x{} pixels, {} colors -> '{}'",
                decoded.width,
                decoded.height,
                decoded.color_count,
                output_path.display()
            );
        }

        Commands::Show { input, colors } => {
            let (pixels, width, height) = load_rgba(&input)?;

            let opts = EncodeOptions {
                max_colors: colors.clamp(2, 256),
                ..Default::default()
            };

            let sixel = sixel_encode(&pixels, width, height, &opts)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&sixel)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
