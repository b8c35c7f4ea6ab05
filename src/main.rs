use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::Parser;
use vidlottie::{logging::init_logging, Conversion, ConvertOptions, Error, Inputs};

/// Convert a video into a Lottie animation of embedded JPEG frames.
///
/// Anything not passed as a flag is asked for on stdin.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of frames to sample (e.g. 40)
    #[arg(short, long, allow_hyphen_values = true)]
    frames: Option<String>,

    /// Path to the MP4 file
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory to write project.json into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JPEG quality, 1-100
    #[arg(short, long, default_value_t = vidlottie::encode::DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Animation name stored in the document
    #[arg(long, default_value = vidlottie::lottie::DEFAULT_NAME)]
    name: String,

    /// Log every frame
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let frames = match args.frames {
        Some(frames) => frames,
        None => prompt(
            "Please enter the desired number of frames for the Lottie sequence (e.g., 40): ",
        )?,
    };
    let input = match args.input {
        Some(input) => input,
        None => prompt("Please enter the file path to the MP4 file: ")?.into(),
    };
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => prompt("Please enter the target directory for the output JSON file: ")?.into(),
    };

    let inputs = report(Inputs::validate(&frames, &input, &output_dir))?;
    let options = report(
        ConvertOptions::new(inputs.frames)
            .with_quality(args.quality)
            .map(|options| options.with_name(args.name)),
    )?;

    let conversion = report(convert(&inputs, &options))?;

    if let Some(reason) = &conversion.halted {
        println!(
            "Stopped early ({}); kept {} of {} frames.",
            reason, conversion.produced, conversion.requested
        );
    }
    println!(
        "Done! The JSON file has been created at '{}'.",
        conversion.output.display()
    );

    Ok(())
}

#[cfg(feature = "gst")]
fn convert(inputs: &Inputs, options: &ConvertOptions) -> vidlottie::Result<Conversion> {
    let mut video =
        vidlottie::VideoSequence::open(&inputs.input).map_err(|e| Error::VideoOpen {
            path: inputs.input.clone(),
            reason: format!("{:#}", e),
        })?;

    // the video is released when `video` drops, on every path out of here
    vidlottie::Pipeline::new(&mut video, options, inputs.output_path(options)).run()
}

#[cfg(not(feature = "gst"))]
fn convert(inputs: &Inputs, _options: &ConvertOptions) -> vidlottie::Result<Conversion> {
    Err(Error::VideoOpen {
        path: inputs.input.clone(),
        reason: "built without video support, enable the `gst` feature".into(),
    })
}

/// Print the status line for a failed step and hand the error on.
fn report<T>(result: vidlottie::Result<T>) -> anyhow::Result<T> {
    result.map_err(|err| {
        println!("{}", status_line(&err));
        err.into()
    })
}

fn status_line(err: &Error) -> String {
    match err {
        Error::InputValidation(msg) => format!("Invalid input: {}.", msg),
        Error::NoFramesProduced { cause: Some(cause) } => format!(
            "{}.\nNo frames were successfully processed. Aborting.",
            cause
        ),
        Error::NoFramesProduced { cause: None } => {
            "No frames were successfully processed. Aborting.".into()
        }
        other => format!("{}.", other),
    }
}

fn prompt(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
