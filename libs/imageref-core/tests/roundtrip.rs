//! Exercises both load paths against the same reference object graph used
//! by `imageref-types`' own unit tests: a scene with a cyclic parent
//! pointer, a dynamic array of pointers, and a dynamic array of strings.
//! `load_image` (copy) and `load_in_place` (relocate over an existing
//! buffer) must agree on the result.

use std::io::Cursor;

use imageref_core::{image_loader, image_writer, ImageHeader};
use imageref_types::asset_id::{AssetId, ClassId};
use imageref_types::dynarray::DynArray;
use imageref_types::sample::{Node, Scene, NODE_TYPE, SCENE_TYPE};
use imageref_types::strings::ImgString;

fn leak_node(node: Node) -> *mut Node {
    Box::into_raw(Box::new(node))
}

fn build_reference_scene() -> (Scene, *mut Node, *mut Node) {
    let mut leaf = Node::default();
    leaf.name = ImgString::from_string("leaf".to_string());
    leaf.asset = AssetId("crate://leaf-texture".to_string());
    let leaf_ptr = leak_node(leaf);

    let mut root = Node::default();
    root.name = ImgString::from_string("root".to_string());
    root.kind = ClassId(NODE_TYPE.type_id());
    root.children = DynArray::from_vec(vec![leaf_ptr]);
    root.tags = DynArray::from_vec(vec![ImgString::from_string("tagged".to_string())]);
    let root_ptr = leak_node(root);
    unsafe {
        (*leaf_ptr).parent = root_ptr;
    }

    (
        Scene {
            name: ImgString::from_string("integration scene".to_string()),
            root: root_ptr,
        },
        root_ptr,
        leaf_ptr,
    )
}

fn assert_scene_matches_reference(scene: &Scene) {
    assert_eq!(scene.name.as_str(), "integration scene");
    let root = unsafe { &*scene.root };
    assert_eq!(root.name.as_str(), "root");
    assert_eq!(root.kind.0, NODE_TYPE.type_id());
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.tags.len(), 1);
    assert_eq!(root.tags.as_slice()[0].as_str(), "tagged");
    let leaf = unsafe { &*root.children.as_slice()[0] };
    assert_eq!(leaf.name.as_str(), "leaf");
    assert_eq!(leaf.asset.0, "crate://leaf-texture");
    let leaf_parent = unsafe { &*leaf.parent };
    assert_eq!(leaf_parent.name.as_str(), "root");
}

#[test]
fn save_then_load_image_matches_the_reference_graph() {
    let (scene, root_ptr, leaf_ptr) = build_reference_scene();

    let mut buf = Vec::new();
    unsafe {
        image_writer::save_image(&scene as *const Scene as *const u8, &SCENE_TYPE, &mut buf)
            .expect("save");
    }

    let loaded = image_loader::load_image(&SCENE_TYPE, &mut Cursor::new(buf), &*imageref_types::REGISTRY)
        .expect("load");
    let loaded_scene = unsafe { &*(loaded.as_ptr() as *const Scene) };
    assert_scene_matches_reference(loaded_scene);

    unsafe {
        drop(Box::from_raw(root_ptr));
        drop(Box::from_raw(leaf_ptr));
    }
}

#[test]
fn save_then_load_in_place_matches_the_load_image_result() {
    let (scene, root_ptr, leaf_ptr) = build_reference_scene();

    let mut file_bytes = Vec::new();
    unsafe {
        image_writer::save_image(
            &scene as *const Scene as *const u8,
            &SCENE_TYPE,
            &mut file_bytes,
        )
        .expect("save");
    }

    let header_len = std::mem::size_of::<ImageHeader>();
    let header = {
        use zerocopy::FromBytes;
        ImageHeader::read_from(&file_bytes[..header_len]).expect("header")
    };
    let mut payload_and_fixups = file_bytes[header_len..].to_vec();

    let in_place_ptr = unsafe {
        image_loader::load_in_place(
            &SCENE_TYPE,
            &header,
            &mut payload_and_fixups,
            &*imageref_types::REGISTRY,
        )
        .expect("load_in_place")
    };
    let in_place_scene = unsafe { &*(in_place_ptr as *const Scene) };
    assert_scene_matches_reference(in_place_scene);

    let copy_loaded = image_loader::load_image(
        &SCENE_TYPE,
        &mut Cursor::new(file_bytes),
        &*imageref_types::REGISTRY,
    )
    .expect("load_image");
    let copy_scene = unsafe { &*(copy_loaded.as_ptr() as *const Scene) };

    assert_eq!(in_place_scene.name.as_str(), copy_scene.name.as_str());
    let in_place_root = unsafe { &*in_place_scene.root };
    let copy_root = unsafe { &*copy_scene.root };
    assert_eq!(in_place_root.name.as_str(), copy_root.name.as_str());
    assert_eq!(in_place_root.children.len(), copy_root.children.len());

    unsafe {
        drop(Box::from_raw(root_ptr));
        drop(Box::from_raw(leaf_ptr));
    }
}
