use clap::Parser as ClapParser;
use log::{LevelFilter, debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use compiler::{CompileOptions, compile};
use parser::format_program;

mod dump;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Compile a BASIC program into a JVM class file", long_about = None)]
struct Cli {
    /// BASIC source file
    #[arg(help = "The .bas file to compile")]
    file: PathBuf,

    /// Where to write the class file
    #[arg(short, long, help = "Output path (default: <ClassName>.class next to FILE)")]
    output: Option<PathBuf>,

    /// Internal name of the generated class
    #[arg(long, help = "Class name (default: derived from the file name)")]
    class_name: Option<String>,

    /// Print the constant pool and disassembly of the produced class
    #[arg(long, help = "Dump the generated class instead of only writing it")]
    dump: bool,

    /// Print the renumbered program and stop
    #[arg(long, help = "Pretty-print the program with renumbered lines")]
    format: bool,

    /// Leave out the LineNumberTable
    #[arg(long, help = "Do not map bytecode to BASIC line numbers")]
    no_line_numbers: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let source = fs::read_to_string(&cli.file)
        .map_err(|err| format!("Error reading file '{}': {err}", cli.file.display()))?;
    let program = parser::parse(&source)
        .map_err(|err| format!("Error parsing {}: {err}", cli.file.display()))?;

    if cli.format {
        println!("{}", format_program(&program));
        return Ok(());
    }

    let options = CompileOptions {
        class_name: cli
            .class_name
            .clone()
            .unwrap_or_else(|| class_name_for(&cli.file)),
        source_file: cli
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        line_numbers: !cli.no_line_numbers,
    };
    debug!("compiling {} as {}", cli.file.display(), options.class_name);
    let bytes = compile(&program, &options)
        .map_err(|err| format!("Error compiling {}: {err}", cli.file.display()))?;

    if cli.dump {
        let listing = dump::dump_class(&bytes).map_err(|err| format!("Error reading back class: {err}"))?;
        print!("{listing}");
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.file, &options.class_name));
    fs::write(&output, &bytes)
        .map_err(|err| format!("Error writing '{}': {err}", output.display()))?;
    info!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// A Java identifier from the file stem: anything else becomes `_`.
fn class_name_for(file: &Path) -> String {
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn default_output(file: &Path, class_name: &str) -> PathBuf {
    let simple = class_name.rsplit('/').next().unwrap_or(class_name);
    file.with_file_name(format!("{simple}.class"))
}

#[cfg(test)]
mod tests {
    use classfile::ClassImage;

    use super::*;

    fn cli(file: PathBuf) -> Cli {
        Cli {
            file,
            output: None,
            class_name: None,
            dump: false,
            format: false,
            no_line_numbers: false,
            verbose: 0,
        }
    }

    #[test]
    fn class_names_from_file_names() {
        assert_eq!(class_name_for(Path::new("dir/hello.bas")), "hello");
        assert_eq!(class_name_for(Path::new("my-game.bas")), "my_game");
        assert_eq!(class_name_for(Path::new("2048.bas")), "_2048");
        assert_eq!(
            default_output(Path::new("dir/x.bas"), "demo/Hello"),
            Path::new("dir/Hello.class")
        );
    }

    #[test]
    fn writes_class_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.bas");
        fs::write(&file, "10 PRINT \"HELLO\"\n").unwrap();

        run(&cli(file)).unwrap();

        let bytes = fs::read(dir.path().join("hello.class")).unwrap();
        let image = ClassImage::parse(&bytes).unwrap();
        assert_eq!(image.this_class, "hello");
        assert_eq!(image.source_file.as_deref(), Some("hello.bas"));
    }

    #[test]
    fn explicit_output_and_class_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prog.bas");
        let output = dir.path().join("out.class");
        fs::write(&file, "10 END\n").unwrap();

        run(&Cli {
            output: Some(output.clone()),
            class_name: Some("demo/Prog".into()),
            ..cli(file)
        })
        .unwrap();

        let image = ClassImage::parse(&fs::read(output).unwrap()).unwrap();
        assert_eq!(image.this_class, "demo/Prog");
    }

    #[test]
    fn errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.bas");
        fs::write(&file, "10 GOTO 20\n").unwrap();
        let err = run(&cli(file)).unwrap_err();
        assert!(err.starts_with("Error compiling"), "{err}");
        assert!(err.contains("line 20"), "{err}");

        let missing = run(&cli(dir.path().join("missing.bas"))).unwrap_err();
        assert!(missing.starts_with("Error reading file"), "{missing}");
    }
}
