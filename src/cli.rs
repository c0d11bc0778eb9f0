use std::{
    error::Error,
    path::{Path, PathBuf},
};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use crate::{
    config::{load_config, load_movie_settings, ScenarioConfig},
    error::ConfigError,
    post_processing::{
        movie::DEFAULT_MOVIE_NAME, render_movie, render_simulation_output, CameraSpec, MovieSettings, MovieSummary,
    },
    scenario::{InputFileWriter, SimulationRequest},
};

const CARGO_PKG_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn app() -> App<'static, 'static> {
    let fps = Arg::with_name("FPS")
        .long("fps")
        .takes_value(true)
        .help("Frames per second of the movie");
    let color = Arg::with_name("COLOR")
        .long("color")
        .takes_value(true)
        .help("Particle color, a name or #rrggbb");
    let virtual_display = Arg::with_name("VIRTUAL_DISPLAY")
        .long("virtual-display")
        .takes_value(false)
        .help("Render inside an Xvfb server");
    let overwrite = Arg::with_name("OVERWRITE_CONFIG_FILE")
        .long("overwrite-config-file")
        .short("c")
        .required(false)
        .takes_value(true)
        .help("Overwrite config");

    App::new("SPH Movie")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("movie")
                .about("Render a directory of VTK snapshots into a movie")
                .arg(
                    Arg::with_name("SNAPSHOT_DIR")
                        .help("Directory with the snapshot files")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("Movie file to write")
                        .required(true)
                        .index(2),
                )
                .arg(fps.clone())
                .arg(color.clone())
                .arg(
                    Arg::with_name("SCALARS")
                        .long("scalars")
                        .takes_value(true)
                        .help("Color particles by this point data array"),
                )
                .arg(
                    Arg::with_name("CLIM")
                        .long("clim")
                        .takes_value(true)
                        .value_name("MIN,MAX")
                        .help("Fixed color map range"),
                )
                .arg(
                    Arg::with_name("CMAP")
                        .long("cmap")
                        .takes_value(true)
                        .help("Color map for --scalars (viridis, inferno, plasma, coolwarm, blackbody, jet)"),
                )
                .arg(
                    Arg::with_name("CAMERA")
                        .long("camera")
                        .takes_value(true)
                        .value_name("PX,PY,PZ,FX,FY,FZ,UX,UY,UZ")
                        .help("Camera position, focal point and view up"),
                )
                .arg(Arg::with_name("WIDTH").long("width").takes_value(true))
                .arg(Arg::with_name("HEIGHT").long("height").takes_value(true))
                .arg(
                    Arg::with_name("POINT_SIZE")
                        .long("point-size")
                        .takes_value(true)
                        .help("Particle diameter in pixels"),
                )
                .arg(
                    Arg::with_name("PARALLEL")
                        .long("parallel")
                        .takes_value(false)
                        .help("Render frames on all cores"),
                )
                .arg(virtual_display.clone())
                .arg(
                    Arg::with_name("CONFIG")
                        .long("config")
                        .takes_value(true)
                        .help("YAML file with movie settings"),
                )
                .arg(overwrite.clone()),
        )
        .subcommand(
            SubCommand::with_name("render")
                .about("Render <SOURCE_DIR>/vtk of a finished simulation into <SOURCE_DIR>/<movie name>")
                .arg(
                    Arg::with_name("SOURCE_DIR")
                        .help("Downloaded simulation output")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("MOVIE_NAME")
                        .long("movie-name")
                        .takes_value(true)
                        .default_value(DEFAULT_MOVIE_NAME),
                )
                .arg(fps)
                .arg(color)
                .arg(virtual_display),
        )
        .subcommand(
            SubCommand::with_name("prepare")
                .about("Write simulator input files for a fluid block scenario")
                .arg(
                    Arg::with_name("SCENARIO_CONFIG")
                        .help("YAML scenario description")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("OUTPUT_DIR")
                        .help("Directory the input files are written to")
                        .required(true)
                        .index(2),
                )
                .arg(overwrite),
        )
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn parse_number<T: std::str::FromStr>(matches: &ArgMatches, name: &str, flag: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    matches
        .value_of(name)
        .map(|s| {
            s.trim().parse::<T>().map_err(|e| ConfigError::Argument {
                flag,
                reason: format!("'{}': {}", s, e),
            })
        })
        .transpose()
}

fn parse_clim(s: &str) -> Result<[f64; 2], ConfigError> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::Argument {
            flag: "clim",
            reason: format!("'{}': {}", s, e),
        })?;
    match values.as_slice() {
        [min, max] if min.is_finite() && max.is_finite() => Ok([*min, *max]),
        _ => Err(ConfigError::Argument {
            flag: "clim",
            reason: format!("expected two finite numbers MIN,MAX, got '{}'", s),
        }),
    }
}

/// Command line flags on top of the settings loaded from files.
fn apply_movie_flags(settings: &mut MovieSettings, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    if let Some(fps) = parse_number(matches, "FPS", "fps")? {
        settings.frame_rate = fps;
    }
    if let Some(color) = matches.value_of("COLOR") {
        settings.color = color.to_string();
    }
    if let Some(scalars) = matches.value_of("SCALARS") {
        settings.scalars = Some(scalars.to_string());
    }
    if let Some(clim) = matches.value_of("CLIM") {
        settings.scalar_range = Some(parse_clim(clim)?);
    }
    if let Some(cmap) = matches.value_of("CMAP") {
        settings.colormap = Some(cmap.to_string());
    }
    if let Some(camera) = matches.value_of("CAMERA") {
        settings.camera = CameraSpec::parse(camera)?;
    }
    if let Some(width) = parse_number(matches, "WIDTH", "width")? {
        settings.width = width;
    }
    if let Some(height) = parse_number(matches, "HEIGHT", "height")? {
        settings.height = height;
    }
    if let Some(point_size) = parse_number(matches, "POINT_SIZE", "point-size")? {
        settings.point_size = point_size;
    }
    if matches.is_present("PARALLEL") {
        settings.parallel = true;
    }
    if matches.is_present("VIRTUAL_DISPLAY") {
        settings.virtual_display = true;
    }
    Ok(())
}

fn report(summary: &MovieSummary) {
    println!(
        "wrote {} frames to {}",
        summary.frame_count,
        summary.output_path.display()
    );
}

fn movie(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let snapshot_dir = matches.value_of("SNAPSHOT_DIR").map(PathBuf::from).unwrap_or_default();
    let output = matches.value_of("OUTPUT").map(PathBuf::from).unwrap_or_default();

    let mut settings = load_movie_settings(
        matches.value_of("CONFIG").map(Path::new),
        matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new),
    )?;
    apply_movie_flags(&mut settings, matches)?;
    log::debug!("{:?}", settings);

    report(&render_movie(&snapshot_dir, &output, &settings)?);
    Ok(())
}

fn render(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let source_dir = matches.value_of("SOURCE_DIR").map(PathBuf::from).unwrap_or_default();
    let movie_name = matches.value_of("MOVIE_NAME").unwrap_or(DEFAULT_MOVIE_NAME);

    let mut settings = MovieSettings::default();
    apply_movie_flags(&mut settings, matches)?;

    report(&render_simulation_output(&source_dir, movie_name, &settings)?);
    Ok(())
}

fn prepare(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config_file = matches.value_of("SCENARIO_CONFIG").map(PathBuf::from).unwrap_or_default();
    let output_dir = matches.value_of("OUTPUT_DIR").map(PathBuf::from).unwrap_or_default();

    let config: ScenarioConfig = load_config(
        &config_file,
        matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new),
    )?;
    let (block, params) = config.resolve()?;

    std::fs::create_dir_all(&output_dir)?;
    match config.simulator.write_inputs(&block, &params, &output_dir)? {
        SimulationRequest::SplishSplash { scene_file } => {
            println!("{}", output_dir.join(scene_file).display());
        }
        SimulationRequest::DualSPHysics { commands } => {
            for command in commands {
                println!("{}", command);
            }
        }
    }
    Ok(())
}

/// Parses the command line and runs the chosen subcommand.
pub fn start() -> Result<(), Box<dyn Error>> {
    let matches = app().get_matches();
    init_logging(matches.occurrences_of("v"));

    match matches.subcommand() {
        ("movie", Some(sub)) => movie(sub),
        ("render", Some(sub)) => render(sub),
        ("prepare", Some(sub)) => prepare(sub),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_flags_override_settings() {
        let matches = app().get_matches_from(vec![
            "sph-movie",
            "movie",
            "in",
            "out.mp4",
            "--fps",
            "24",
            "--scalars",
            "velocity",
            "--clim",
            "0,2.5",
            "--camera",
            "1,2,3,0,0,0,0,0,1",
            "--parallel",
        ]);
        let sub = matches.subcommand_matches("movie").unwrap();
        let mut settings = MovieSettings::default();
        apply_movie_flags(&mut settings, sub).unwrap();

        assert_eq!(settings.frame_rate, 24.);
        assert_eq!(settings.scalars.as_deref(), Some("velocity"));
        assert_eq!(settings.scalar_range, Some([0., 2.5]));
        assert_eq!(settings.camera.position, [1., 2., 3.]);
        assert!(settings.parallel);
        assert!(!settings.virtual_display);
    }

    #[test]
    fn bad_numbers_name_the_flag() {
        let matches = app().get_matches_from(vec!["sph-movie", "render", "out", "--fps", "fast"]);
        let sub = matches.subcommand_matches("render").unwrap();
        let err = apply_movie_flags(&mut MovieSettings::default(), sub).unwrap_err();
        assert!(err.to_string().contains("--fps"), "{}", err);
    }

    #[test]
    fn clim_needs_two_values() {
        assert_eq!(parse_clim("-1, 1").unwrap(), [-1., 1.]);
        assert!(parse_clim("1").is_err());
        assert!(parse_clim("1,2,3").is_err());
        assert!(parse_clim("a,b").is_err());
        assert!(parse_clim("0,inf").is_err());
        assert!(parse_clim("-inf,0").is_err());
        assert!(parse_clim("NaN,1").is_err());
    }

    #[test]
    fn render_defaults_to_movie_mp4() {
        let matches = app().get_matches_from(vec!["sph-movie", "render", "out"]);
        let sub = matches.subcommand_matches("render").unwrap();
        assert_eq!(sub.value_of("MOVIE_NAME"), Some("movie.mp4"));
    }
}
