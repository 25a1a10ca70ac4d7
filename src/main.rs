// This file is part of OpenFA.
//
// OpenFA is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenFA is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenFA.  If not, see <http://www.gnu.org/licenses/>.

//! CLI demo for the relocatable-image serializer: builds a small sample
//! scene, saves it, and loads it back either by copy or in place over an
//! mmap. Bootstrapping follows this workspace's other binaries: parse an
//! `Opt` with `structopt`, call `env_logger::init()`, return `anyhow::Result`.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::mem::size_of;
use std::path::PathBuf;

use anyhow::Result;
use imageref_core::image_header::ImageHeader;
use imageref_types::asset_id::ClassId;
use imageref_types::dynarray::DynArray;
use imageref_types::sample::{Node, Scene, ALL_TYPES, NODE_TYPE, SCENE_TYPE};
use imageref_types::strings::ImgString;
use structopt::StructOpt;
use zerocopy::FromBytes;

#[derive(Clone, Debug, StructOpt)]
enum Command {
    /// Builds a small sample scene and writes it to `path`.
    Save {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
    /// Copy-loads `path` and prints a summary of the scene.
    Load {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
    /// Loads `path` in place over an mmap and prints a summary of the scene.
    Inspect {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "imageref", about = "relocatable binary image serializer demo")]
struct Opt {
    #[structopt(subcommand)]
    command: Command,
}

fn build_sample_scene() -> Scene {
    let mut leaf = Node::default();
    leaf.name = ImgString::from_string("leaf".to_string());
    let leaf_ptr = Box::into_raw(Box::new(leaf));

    let mut root = Node::default();
    root.name = ImgString::from_string("root".to_string());
    root.kind = ClassId(NODE_TYPE.type_id());
    root.children = DynArray::from_vec(vec![leaf_ptr]);
    let root_ptr = Box::into_raw(Box::new(root));
    unsafe {
        (*leaf_ptr).parent = root_ptr;
    }

    Scene {
        name: ImgString::from_string("demo scene".to_string()),
        root: root_ptr,
    }
}

fn describe_scene(scene: &Scene) {
    println!("scene: {}", scene.name.as_str());
    if scene.root.is_null() {
        println!("  (no root)");
        return;
    }
    let root = unsafe { &*scene.root };
    println!("  root: {}", root.name.as_str());
    println!("  children: {}", root.children.len());
    for child in root.children.as_slice() {
        let child = unsafe { &**child };
        println!("    - {}", child.name.as_str());
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    log::info!("registered {} types", ALL_TYPES.len());

    match opt.command {
        Command::Save { path } => {
            let scene = build_sample_scene();
            let file = File::create(&path)?;
            let mut writer = BufWriter::new(file);
            unsafe {
                imageref_core::image_writer::save_image(
                    &scene as *const Scene as *const u8,
                    &SCENE_TYPE,
                    &mut writer,
                )?;
            }
            log::info!("wrote sample scene to {}", path.display());
        }
        Command::Load { path } => {
            let file = File::open(&path)?;
            let mut reader = BufReader::new(file);
            let buffer = imageref_core::image_loader::load_image(
                &SCENE_TYPE,
                &mut reader,
                &*imageref_types::registry::REGISTRY,
            )?;
            let scene = unsafe { &*(buffer.as_ptr() as *const Scene) };
            describe_scene(scene);
        }
        Command::Inspect { path } => {
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            let mut mmap = unsafe { memmap::MmapMut::map_mut(&file)? };
            let header_len = size_of::<ImageHeader>();
            let header = ImageHeader::read_from(&mmap[..header_len])
                .expect("file too short for an image header");
            let scene_ptr = unsafe {
                imageref_core::image_loader::load_in_place(
                    &SCENE_TYPE,
                    &header,
                    &mut mmap[header_len..],
                    &*imageref_types::registry::REGISTRY,
                )?
            };
            let scene = unsafe { &*(scene_ptr as *const Scene) };
            describe_scene(scene);
        }
    }
    Ok(())
}
