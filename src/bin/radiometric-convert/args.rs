use anyhow::Result;
use clap::value_t_or_exit;
use std::path::PathBuf;

use radiometric::codec::BitDepth;
use radiometric::image::OutputKind;
use radiometric::{arg, args_parser, opt};

pub struct Args {
    pub path: PathBuf,
    pub is_json: bool,
    pub output: Option<PathBuf>,
    pub kind: OutputKind,
    pub bit_depth: BitDepth,
    pub exiftool: String,
    pub copy_exif: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("radiometric-convert")
            .about("Convert a radiometric thermal image to a raw or temperature file.")
            .arg(
                opt!("json")
                    .short("j")
                    .takes_value(false)
                    .help("Path is a json created using `exiftool -j -b` (default: path is an image)"),
            )
            .arg(
                opt!("output")
                    .short("o")
                    .help("Output path (default: derived from the input name)"),
            )
            .arg(
                opt!("output kind")
                    .short("k")
                    .help("`raw` or `temperature`. Default is raw"),
            )
            .arg(
                opt!("bit depth")
                    .short("b")
                    .help("Bits per sample for temperature output: 16, 32 or 64. Default is 16"),
            )
            .arg(opt!("exiftool").help("exiftool command to run. Default is `exiftool`"))
            .arg(
                opt!("copy exif")
                    .takes_value(false)
                    .short("x")
                    .help("Copy exif from the source file to the output (requires exiftool)"),
            )
            .arg(arg!("path").required(true).help("Image / json path"))
            .get_matches();

        let path = value_t_or_exit!(matches, "path", PathBuf);
        let output = matches
            .is_present("output")
            .then(|| value_t_or_exit!(matches, "output", PathBuf));
        let kind = matches
            .is_present("output kind")
            .then(|| value_t_or_exit!(matches, "output kind", OutputKind))
            .unwrap_or(OutputKind::Raw);
        let bit_depth = matches
            .is_present("bit depth")
            .then(|| value_t_or_exit!(matches, "bit depth", BitDepth))
            .unwrap_or(BitDepth::Sixteen);
        let exiftool = matches.value_of("exiftool").unwrap_or("exiftool").to_owned();

        let is_json = matches.is_present("json");
        let copy_exif = matches.is_present("copy exif");

        Ok(Args {
            path,
            is_json,
            output,
            kind,
            bit_depth,
            exiftool,
            copy_exif,
        })
    }
}
