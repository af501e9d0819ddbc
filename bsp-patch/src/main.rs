use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bsp_patch::deluxe::{HalveLightmapIndices, SplitDeluxemaps};
use bsp_patch::migrate::MigrateLights;
use bsp_patch::nomip::{AppendNomipShaders, PrependNomipSurfaces};
use bsp_patch::pipeline::{write_outputs, Pipeline, Report, Stage};
use bsp_patch::shader_script::decode_latin1;
use clap::{Parser, Subcommand};
use env_logger::Env;
use idtech3_bsp::bsp::Bsp;
use idtech3_bsp::file::path::AssetPath;
use idtech3_bsp::file::{open_base_dirs, FileLoader};
use log::info;
use memmap::Mmap;

#[derive(Parser)]
#[command(name = "bsp-patch", version, about)]
struct Cli {
    /// Game base directory to search for assets; later ones take precedence.
    #[arg(long = "base", value_name = "DIR")]
    bases: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the header and the element count of every lump.
    Info { file: Option<PathBuf> },
    /// Moves interleaved deluxe maps into `<map>_noDeluxe/dm_NNNN.tga`.
    SplitDeluxe { file: Option<PathBuf> },
    /// Converts a Heavy Metal FAKK2 map to American McGee's Alice.
    FakkToAlice { file: Option<PathBuf> },
    /// Adds nomipmaps shaders for the map's external lightmaps.
    NomipLightmaps { file: Option<PathBuf> },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (file, op): (_, fn(&Path, &[PathBuf]) -> Result<()>) = match cli.command {
        Command::Info { file } => (file, print_info),
        Command::SplitDeluxe { file } => (file, split_deluxe),
        Command::FakkToAlice { file } => (file, fakk_to_alice),
        Command::NomipLightmaps { file } => (file, nomip_lightmaps),
    };
    match file {
        Some(file) => op(&file, &cli.bases),
        None => {
            println!("No file specified for operation");
            Ok(())
        }
    }
}

fn load_bsp(path: &Path) -> Result<Bsp> {
    let file = File::open(path).with_context(|| format!("Opening map file {:?}", path))?;
    let data = unsafe { Mmap::map(&file) }.with_context(|| format!("Mapping {:?}", path))?;
    Bsp::parse(&data).with_context(|| format!("Parsing {:?}", path))
}

fn summary(path: &Path, bsp: &Bsp) -> Vec<String> {
    let header = bsp.header();
    let mut lines = vec![format!(
        "BSP: {} [{} {}] ({})",
        path.display(),
        header.magic_str(),
        header.version,
        bsp.format().name,
    )];
    for lump in bsp.lumps() {
        lines.push(format!(
            "{} Number of Elements: {}",
            lump.name.name(),
            lump.data.len(),
        ));
    }
    lines
}

/// `maps/foo.bsp` with suffix `_alice.bsp` becomes `maps/foo_alice.bsp`.
fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", stem, suffix))
}

/// Splits a map path at its `maps` directory into the game base directory and the map name
/// relative to `maps/`, without extension.
fn split_base(path: &Path) -> Result<(PathBuf, String)> {
    let text = path.to_string_lossy().replace('\\', "/");
    let (base, rest) = match text.split_once("/maps/") {
        Some((base, rest)) => (if base.is_empty() { "/" } else { base }, rest),
        None => match text.strip_prefix("maps/") {
            Some(rest) => (".", rest),
            None => bail!(
                "Could not find base path in {}: the BSP must be in the base's maps folder",
                text,
            ),
        },
    };
    let map_name = match rest.rfind('.') {
        Some(dot) if !rest[dot..].contains('/') => &rest[..dot],
        _ => rest,
    };
    Ok((PathBuf::from(base), map_name.to_string()))
}

fn run(pipeline: Pipeline, mut bsp: Bsp, output: &Path) -> Result<()> {
    info!("Stages: {}", pipeline.stage_names().join(", "));
    match pipeline.run(&mut bsp)? {
        Report::Ready(sidecars) => write_outputs(output, &bsp, &sidecars),
        Report::NothingToDo(reason) => {
            info!("Nothing written: {}", reason);
            Ok(())
        }
    }
}

fn print_info(path: &Path, _bases: &[PathBuf]) -> Result<()> {
    let bsp = load_bsp(path)?;
    for line in summary(path, &bsp) {
        println!("{}", line);
    }
    Ok(())
}

fn split_deluxe(path: &Path, _bases: &[PathBuf]) -> Result<()> {
    let bsp = load_bsp(path)?;
    summary(path, &bsp).iter().for_each(|line| info!("{}", line));

    let output = derived_path(path, "_noDeluxe.bsp");
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(SplitDeluxemaps {
            image_dir: output.with_extension(""),
        }),
        Box::new(HalveLightmapIndices),
    ];
    run(Pipeline::new(stages)?, bsp, &output)
}

fn fakk_to_alice(path: &Path, _bases: &[PathBuf]) -> Result<()> {
    let is_map_source = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("map"));
    let path = if is_map_source {
        path.with_extension("bsp")
    } else {
        path.to_path_buf()
    };
    let bsp = load_bsp(&path)?;
    summary(&path, &bsp).iter().for_each(|line| info!("{}", line));

    let output = derived_path(&path, "_alice.bsp");
    let stages: Vec<Box<dyn Stage>> = vec![Box::new(MigrateLights)];
    run(Pipeline::new(stages)?, bsp, &output)
}

fn nomip_lightmaps(path: &Path, bases: &[PathBuf]) -> Result<()> {
    let (base, map_name) = split_base(path)?;
    info!("Guessed base path: {}", base.display());

    let mut search = bases.to_vec();
    search.push(base.clone());
    let vfs = open_base_dirs(&search)?;

    let bsp = load_bsp(path)?;
    summary(path, &bsp).iter().for_each(|line| info!("{}", line));

    let images: Vec<String> = vfs
        .list_files(&AssetPath::new("maps").join(&map_name), "tga")?
        .into_iter()
        .filter(|image| image.file_name().to_ascii_lowercase().starts_with("lm_"))
        .map(|image| image.as_str().to_string())
        .collect();
    info!("External lightmaps: {:?}", images);

    let shader_dir = if base.join("shaders").is_dir() {
        "shaders"
    } else {
        "scripts"
    };
    info!("Shader path: {}", shader_dir);
    let script = AssetPath::new(shader_dir).join(&format!("q3map2_{}.shader", map_name));
    let script_text = vfs
        .load_file(&script)?
        .map(|data| decode_latin1(&data))
        .unwrap_or_default();

    let output = derived_path(path, "_nomip_ext_lm.bsp");
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(AppendNomipShaders {
            map_name,
            images,
            script_path: base.join(script.as_str()),
            script_text,
        }),
        Box::new(PrependNomipSurfaces),
    ];
    run(Pipeline::new(stages)?, bsp, &output)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use idtech3_bsp::format::{LumpName, IBSP46};
    use idtech3_bsp::record::{Field, Record, LIGHTMAP, Q3_SHADER, Q3_SURFACE};

    use super::*;

    #[test]
    fn output_names() {
        assert_eq!(
            derived_path(Path::new("base/maps/dm1.bsp"), "_noDeluxe.bsp"),
            Path::new("base/maps/dm1_noDeluxe.bsp"),
        );
        assert_eq!(
            derived_path(Path::new("dm1.bsp"), "_alice.bsp"),
            Path::new("dm1_alice.bsp"),
        );
        assert_eq!(
            derived_path(Path::new("base/maps/dm1_noDeluxe.bsp"), "").with_extension(""),
            Path::new("base/maps/dm1_noDeluxe"),
        );
    }

    #[test]
    fn base_and_map_name() {
        assert_eq!(
            split_base(Path::new("/games/q3/baseq3/maps/sub/dm1.bsp")).unwrap(),
            (PathBuf::from("/games/q3/baseq3"), "sub/dm1".to_string()),
        );
        assert_eq!(
            split_base(Path::new("C:\\q3\\baseq3\\maps\\dm1.bsp")).unwrap(),
            (PathBuf::from("C:/q3/baseq3"), "dm1".to_string()),
        );
        assert_eq!(
            split_base(Path::new("maps/dm1.bsp")).unwrap(),
            (PathBuf::from("."), "dm1".to_string()),
        );
        assert!(split_base(Path::new("/tmp/dm1.bsp")).is_err());
    }

    #[test]
    fn split_deluxe_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dm1.bsp");
        let mut bsp = Bsp::new(&IBSP46);
        let mut surface = Record::zeroed(&Q3_SURFACE);
        surface.set_i32(Field::LightmapNum, 0, 3).unwrap();
        bsp.replace_lumps(vec![
            (
                LumpName::Lightmaps,
                vec![Record::zeroed(&LIGHTMAP); 4],
            ),
            (LumpName::Surfaces, vec![surface]),
        ])
        .unwrap();
        fs::write(&input, bsp.to_bytes().unwrap()).unwrap();

        split_deluxe(&input, &[]).unwrap();

        let output = load_bsp(&dir.path().join("dm1_noDeluxe.bsp")).unwrap();
        assert_eq!(output.records(LumpName::Lightmaps).unwrap().len(), 2);
        assert_eq!(
            output.records(LumpName::Surfaces).unwrap()[0]
                .get_i32(Field::LightmapNum, 0)
                .unwrap(),
            1,
        );
        assert!(dir.path().join("dm1_noDeluxe/dm_0000.tga").is_file());
        assert!(dir.path().join("dm1_noDeluxe/dm_0001.tga").is_file());
    }

    #[test]
    fn nothing_written_without_deluxe_maps() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dm1.bsp");
        fs::write(&input, Bsp::new(&IBSP46).to_bytes().unwrap()).unwrap();
        split_deluxe(&input, &[]).unwrap();
        assert!(!dir.path().join("dm1_noDeluxe.bsp").exists());
    }

    #[test]
    fn nomip_lightmaps_writes_script_and_bsp() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("baseq3");
        fs::create_dir_all(base.join("maps/dm1")).unwrap();
        for i in 0..3 {
            fs::write(base.join(format!("maps/dm1/lm_{:04}.tga", i)), b"").unwrap();
        }
        fs::write(base.join("maps/dm1/other.tga"), b"").unwrap();

        let mut bsp = Bsp::new(&IBSP46);
        bsp.replace_lumps(vec![
            (LumpName::Shaders, vec![Record::zeroed(&Q3_SHADER)]),
            (LumpName::Surfaces, vec![Record::zeroed(&Q3_SURFACE)]),
        ])
        .unwrap();
        let input = base.join("maps/dm1.bsp");
        fs::write(&input, bsp.to_bytes().unwrap()).unwrap();

        nomip_lightmaps(&input, &[]).unwrap();

        let script = fs::read_to_string(base.join("scripts/q3map2_dm1.shader")).unwrap();
        assert_eq!(
            script,
            "dm1/force_nomip_0\n{\n\tnomipmaps\n\
             \t{\n\t\tmap maps/dm1/lm_0000.tga\n\t}\n\
             \t{\n\t\tmap maps/dm1/lm_0001.tga\n\t}\n\
             \t{\n\t\tmap maps/dm1/lm_0002.tga\n\t}\n}\n\n",
        );
        let output = load_bsp(&base.join("maps/dm1_nomip_ext_lm.bsp")).unwrap();
        assert_eq!(output.records(LumpName::Shaders).unwrap().len(), 2);
        assert_eq!(output.records(LumpName::Surfaces).unwrap().len(), 2);
    }
}
