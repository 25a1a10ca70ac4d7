//! Demo reflected types exercising every kind the core's visitor dispatches
//! on: nested classes, pointers (including a self-referential `parent`
//! pointer for cyclic-graph coverage), dynamic arrays of pointers and of
//! strings, a string field, an asset id, and a class id.

use imageref_core::type_model::{
    ClassLayout, ClumpLayout, FieldFlags, FieldInfo, TypeDescriptor, TypeKind,
};
use memoffset::offset_of;

use crate::asset_id::{AssetId, ClassId, ASSET_ID_TYPE, CLASS_ID_TYPE};
use crate::dynarray::DynArray;
use crate::primitive;
use crate::strings::{ImgString, IMG_STRING_TYPE};
use crate::{declare_array_type, declare_pointer_type};

#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub struct Vec3Type;
pub static VEC3_TYPE: Vec3Type = Vec3Type;

static VEC3_FIELDS: [FieldInfo; 3] = [
    FieldInfo {
        name: "x",
        field_type: &primitive::F32_TYPE,
        offset: offset_of!(Vec3, x),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "y",
        field_type: &primitive::F32_TYPE,
        offset: offset_of!(Vec3, y),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "z",
        field_type: &primitive::F32_TYPE,
        offset: offset_of!(Vec3, z),
        flags: FieldFlags::NONE,
    },
];

impl TypeDescriptor for Vec3Type {
    fn kind(&self) -> TypeKind {
        TypeKind::Class
    }
    fn size(&self) -> usize {
        std::mem::size_of::<Vec3>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<Vec3>()
    }
    fn type_id(&self) -> imageref_core::type_model::TypeId {
        10
    }
    fn name(&self) -> &'static str {
        "Vec3"
    }
    fn as_class(&self) -> Option<&dyn ClassLayout> {
        Some(self)
    }
}

impl ClassLayout for Vec3Type {
    fn fields(&self) -> &'static [FieldInfo] {
        &VEC3_FIELDS
    }
}

#[repr(C)]
pub struct Node {
    pub name: ImgString,
    pub position: Vec3,
    pub parent: *mut Node,
    pub children: DynArray<*mut Node>,
    pub tags: DynArray<ImgString>,
    pub asset: AssetId,
    pub kind: ClassId,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            name: ImgString::new(),
            position: Vec3::default(),
            parent: std::ptr::null_mut(),
            children: DynArray::new(),
            tags: DynArray::new(),
            asset: AssetId::default(),
            kind: ClassId::default(),
        }
    }
}

declare_pointer_type!(NODE_POINTER_TYPE, NodePointerType, &NODE_TYPE, 20, "*mut Node");
declare_array_type!(
    NODE_CHILDREN_ARRAY_TYPE,
    NodeChildrenArrayType,
    *mut Node,
    &NODE_POINTER_TYPE,
    21,
    "Array<*mut Node>"
);
declare_array_type!(
    NODE_TAGS_ARRAY_TYPE,
    NodeTagsArrayType,
    ImgString,
    &IMG_STRING_TYPE,
    22,
    "Array<ImgString>"
);

pub struct NodeType;
pub static NODE_TYPE: NodeType = NodeType;

static NODE_FIELDS: [FieldInfo; 7] = [
    FieldInfo {
        name: "name",
        field_type: &IMG_STRING_TYPE,
        offset: offset_of!(Node, name),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "position",
        field_type: &VEC3_TYPE,
        offset: offset_of!(Node, position),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "parent",
        field_type: &NODE_POINTER_TYPE,
        offset: offset_of!(Node, parent),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "children",
        field_type: &NODE_CHILDREN_ARRAY_TYPE,
        offset: offset_of!(Node, children),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "tags",
        field_type: &NODE_TAGS_ARRAY_TYPE,
        offset: offset_of!(Node, tags),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "asset",
        field_type: &ASSET_ID_TYPE,
        offset: offset_of!(Node, asset),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "kind",
        field_type: &CLASS_ID_TYPE,
        offset: offset_of!(Node, kind),
        flags: FieldFlags::NONE,
    },
];

impl TypeDescriptor for NodeType {
    fn kind(&self) -> TypeKind {
        TypeKind::Class
    }
    fn size(&self) -> usize {
        std::mem::size_of::<Node>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<Node>()
    }
    fn type_id(&self) -> imageref_core::type_model::TypeId {
        23
    }
    fn name(&self) -> &'static str {
        "Node"
    }
    fn as_class(&self) -> Option<&dyn ClassLayout> {
        Some(self)
    }
}

impl ClassLayout for NodeType {
    fn fields(&self) -> &'static [FieldInfo] {
        &NODE_FIELDS
    }
}

#[repr(C)]
pub struct Scene {
    pub name: ImgString,
    pub root: *mut Node,
}

impl Default for Scene {
    fn default() -> Self {
        Scene {
            name: ImgString::new(),
            root: std::ptr::null_mut(),
        }
    }
}

pub struct SceneType;
pub static SCENE_TYPE: SceneType = SceneType;

static SCENE_FIELDS: [FieldInfo; 2] = [
    FieldInfo {
        name: "name",
        field_type: &IMG_STRING_TYPE,
        offset: offset_of!(Scene, name),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "root",
        field_type: &NODE_POINTER_TYPE,
        offset: offset_of!(Scene, root),
        flags: FieldFlags::NONE,
    },
];

impl TypeDescriptor for SceneType {
    fn kind(&self) -> TypeKind {
        TypeKind::Class
    }
    fn size(&self) -> usize {
        std::mem::size_of::<Scene>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<Scene>()
    }
    fn type_id(&self) -> imageref_core::type_model::TypeId {
        30
    }
    fn name(&self) -> &'static str {
        "Scene"
    }
    fn as_class(&self) -> Option<&dyn ClassLayout> {
        Some(self)
    }
}

impl ClassLayout for SceneType {
    fn fields(&self) -> &'static [FieldInfo] {
        &SCENE_FIELDS
    }
}

declare_array_type!(
    CLUMP_POSITIONS_ARRAY_TYPE,
    ClumpPositionsArrayType,
    Vec3,
    &VEC3_TYPE,
    40,
    "Array<Vec3>"
);

/// A clump holding two homogeneous lists: raw positions and node pointers.
/// Exercises [`ClumpLayout`] the way a level's "bag of arrays" container
/// does in the source -- the lists are reflected as ordinary array-shaped
/// fields, and the clump itself only needs to enumerate them.
#[repr(C)]
pub struct SceneGraph {
    pub positions: DynArray<Vec3>,
    pub nodes: DynArray<*mut Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        SceneGraph {
            positions: DynArray::new(),
            nodes: DynArray::new(),
        }
    }
}

pub struct SceneGraphType;
pub static SCENE_GRAPH_TYPE: SceneGraphType = SceneGraphType;

static SCENE_GRAPH_FIELDS: [FieldInfo; 2] = [
    FieldInfo {
        name: "positions",
        field_type: &CLUMP_POSITIONS_ARRAY_TYPE,
        offset: offset_of!(SceneGraph, positions),
        flags: FieldFlags::NONE,
    },
    FieldInfo {
        name: "nodes",
        field_type: &NODE_CHILDREN_ARRAY_TYPE,
        offset: offset_of!(SceneGraph, nodes),
        flags: FieldFlags::NONE,
    },
];

impl TypeDescriptor for SceneGraphType {
    fn kind(&self) -> TypeKind {
        TypeKind::Class
    }
    fn size(&self) -> usize {
        std::mem::size_of::<SceneGraph>()
    }
    fn align(&self) -> usize {
        std::mem::align_of::<SceneGraph>()
    }
    fn type_id(&self) -> imageref_core::type_model::TypeId {
        41
    }
    fn name(&self) -> &'static str {
        "SceneGraph"
    }
    fn as_class(&self) -> Option<&dyn ClassLayout> {
        Some(self)
    }
    fn as_clump(&self) -> Option<&dyn ClumpLayout> {
        Some(self)
    }
}

impl ClassLayout for SceneGraphType {
    fn fields(&self) -> &'static [FieldInfo] {
        &SCENE_GRAPH_FIELDS
    }
}

impl ClumpLayout for SceneGraphType {
    unsafe fn list_count(&self, _clump: *const u8) -> usize {
        2
    }

    unsafe fn list_at(&self, clump: *const u8, index: usize) -> (*const u8, &'static dyn TypeDescriptor) {
        let graph = clump as *const SceneGraph;
        match index {
            0 => (
                std::ptr::addr_of!((*graph).positions) as *const u8,
                &CLUMP_POSITIONS_ARRAY_TYPE,
            ),
            1 => (
                std::ptr::addr_of!((*graph).nodes) as *const u8,
                &NODE_CHILDREN_ARRAY_TYPE,
            ),
            _ => panic!("SceneGraph only has 2 lists"),
        }
    }
}

pub static ALL_TYPES: &[&'static dyn TypeDescriptor] = &[
    &VEC3_TYPE,
    &NODE_TYPE,
    &SCENE_TYPE,
    &NODE_POINTER_TYPE,
    &NODE_CHILDREN_ARRAY_TYPE,
    &NODE_TAGS_ARRAY_TYPE,
    &CLUMP_POSITIONS_ARRAY_TYPE,
    &SCENE_GRAPH_TYPE,
    &primitive::F32_TYPE,
    &primitive::U32_TYPE,
    &primitive::U64_TYPE,
    &primitive::I32_TYPE,
    &primitive::U8_TYPE,
    &primitive::BOOL_TYPE,
];

#[cfg(test)]
mod tests {
    use super::*;
    use imageref_core::{clump, image_loader, image_writer};

    fn leak_node(node: Node) -> *mut Node {
        Box::into_raw(Box::new(node))
    }

    #[test]
    fn round_trips_a_scene_with_children_tags_and_cycle() {
        let mut leaf = Node::default();
        leaf.name = ImgString::from_string("leaf".to_string());
        leaf.asset = AssetId("crate://leaf-texture".to_string());
        let leaf_ptr = leak_node(leaf);

        let mut root = Node::default();
        root.name = ImgString::from_string("root".to_string());
        root.position = Vec3 { x: 1.0, y: 2.0, z: 3.0 };
        root.kind = ClassId(NODE_TYPE.type_id());
        root.children = DynArray::from_vec(vec![leaf_ptr]);
        root.tags = DynArray::from_vec(vec![
            ImgString::from_string("a".to_string()),
            ImgString::from_string("b".to_string()),
        ]);
        let root_ptr = leak_node(root);
        unsafe {
            (*leaf_ptr).parent = root_ptr;
        }

        let scene = Scene {
            name: ImgString::from_string("test scene".to_string()),
            root: root_ptr,
        };

        let mut buf = Vec::new();
        unsafe {
            image_writer::save_image(&scene as *const Scene as *const u8, &SCENE_TYPE, &mut buf)
                .expect("save");
        }

        let loaded = image_loader::load_image(
            &SCENE_TYPE,
            &mut std::io::Cursor::new(buf),
            &*crate::registry::REGISTRY,
        )
        .expect("load");
        let loaded_scene = unsafe { &*(loaded.as_ptr() as *const Scene) };
        assert_eq!(loaded_scene.name.as_str(), "test scene");
        let loaded_root = unsafe { &*loaded_scene.root };
        assert_eq!(loaded_root.name.as_str(), "root");
        assert_eq!(loaded_root.position, Vec3 { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(loaded_root.kind.0, NODE_TYPE.type_id());
        assert_eq!(loaded_root.children.len(), 1);
        assert_eq!(loaded_root.tags.len(), 2);
        assert_eq!(loaded_root.tags.as_slice()[0].as_str(), "a");
        let loaded_leaf = unsafe { &*loaded_root.children.as_slice()[0] };
        assert_eq!(loaded_leaf.name.as_str(), "leaf");
        assert_eq!(loaded_leaf.asset.0, "crate://leaf-texture");
        let loaded_leaf_parent = unsafe { &*loaded_leaf.parent };
        assert_eq!(loaded_leaf_parent.name.as_str(), "root");

        unsafe {
            drop(Box::from_raw(root_ptr));
            drop(Box::from_raw(leaf_ptr));
        }
    }

    struct EmptyRegistry;

    impl imageref_core::type_model::TypeRegistry for EmptyRegistry {
        fn resolve(&self, _type_id: imageref_core::type_model::TypeId) -> Option<&'static dyn TypeDescriptor> {
            None
        }
    }

    #[test]
    fn load_with_a_registry_missing_the_root_class_id_fails_with_unknown_type() {
        let mut root = Node::default();
        root.name = ImgString::from_string("root".to_string());
        root.kind = ClassId(NODE_TYPE.type_id());
        let root_ptr = leak_node(root);
        let scene = Scene {
            name: ImgString::new(),
            root: root_ptr,
        };

        let mut buf = Vec::new();
        unsafe {
            image_writer::save_image(&scene as *const Scene as *const u8, &SCENE_TYPE, &mut buf)
                .expect("save");
        }

        let err = image_loader::load_image(&SCENE_TYPE, &mut std::io::Cursor::new(buf), &EmptyRegistry)
            .unwrap_err();
        assert!(matches!(
            err,
            imageref_core::ImageError::UnknownType(id) if id == NODE_TYPE.type_id()
        ));

        unsafe {
            drop(Box::from_raw(root_ptr));
        }
    }

    #[test]
    fn round_trips_an_empty_children_array() {
        let root = Node::default();
        let root_ptr = leak_node(root);
        let scene = Scene {
            name: ImgString::new(),
            root: root_ptr,
        };

        let mut buf = Vec::new();
        unsafe {
            image_writer::save_image(&scene as *const Scene as *const u8, &SCENE_TYPE, &mut buf)
                .expect("save");
        }
        let loaded = image_loader::load_image(
            &SCENE_TYPE,
            &mut std::io::Cursor::new(buf),
            &*crate::registry::REGISTRY,
        )
        .expect("load");
        let loaded_scene = unsafe { &*(loaded.as_ptr() as *const Scene) };
        let loaded_root = unsafe { &*loaded_scene.root };
        assert_eq!(loaded_root.children.len(), 0);

        unsafe {
            drop(Box::from_raw(root_ptr));
        }
    }

    #[test]
    fn rejects_an_image_for_the_wrong_root_type() {
        let mut buf = Vec::new();
        let v = Vec3 { x: 1.0, y: 2.0, z: 3.0 };
        unsafe {
            image_writer::save_image(&v as *const Vec3 as *const u8, &VEC3_TYPE, &mut buf)
                .expect("save");
        }
        let err = image_loader::load_image(
            &SCENE_TYPE,
            &mut std::io::Cursor::new(buf),
            &*crate::registry::REGISTRY,
        )
        .unwrap_err();
        assert!(matches!(err, imageref_core::ImageError::ObjectOfWrongType { .. }));
    }

    #[test]
    fn round_trips_a_clump_with_two_lists() {
        let a_ptr = leak_node(Node::default());
        let b_ptr = leak_node(Node::default());

        let graph = SceneGraph {
            positions: DynArray::from_vec(vec![
                Vec3 { x: 1.0, y: 0.0, z: 0.0 },
                Vec3 { x: 0.0, y: 1.0, z: 0.0 },
            ]),
            nodes: DynArray::from_vec(vec![a_ptr, b_ptr]),
        };

        let mut buf = Vec::new();
        unsafe {
            clump::save_clump(&graph as *const SceneGraph as *const u8, &SCENE_GRAPH_TYPE, &mut buf)
                .expect("save_clump");
        }

        let mut cursor = std::io::Cursor::new(buf);
        let header_len = std::mem::size_of::<imageref_core::ImageHeader>();
        let mut header_bytes = vec![0u8; header_len];
        std::io::Read::read_exact(&mut cursor, &mut header_bytes).expect("header");
        let header = {
            use zerocopy::FromBytes;
            imageref_core::ImageHeader::read_from(&header_bytes[..]).expect("header")
        };
        let mut buffer = vec![0u8; header.payload_size as usize];
        clump::load_clump(
            &SCENE_GRAPH_TYPE,
            &mut cursor,
            header.payload_size,
            &mut buffer,
            &*crate::registry::REGISTRY,
        )
        .expect("load_clump");
        let loaded_graph = unsafe { &*(buffer.as_ptr() as *const SceneGraph) };
        assert_eq!(loaded_graph.positions.len(), 2);
        assert_eq!(loaded_graph.positions.as_slice()[1], Vec3 { x: 0.0, y: 1.0, z: 0.0 });
        assert_eq!(loaded_graph.nodes.len(), 2);

        unsafe {
            drop(Box::from_raw(a_ptr));
            drop(Box::from_raw(b_ptr));
        }
    }

    #[test]
    fn round_trips_a_clump_with_an_empty_list() {
        let graph = SceneGraph {
            positions: DynArray::new(),
            nodes: DynArray::new(),
        };

        let mut buf = Vec::new();
        unsafe {
            clump::save_clump(&graph as *const SceneGraph as *const u8, &SCENE_GRAPH_TYPE, &mut buf)
                .expect("save_clump");
        }

        let mut cursor = std::io::Cursor::new(buf);
        let header_len = std::mem::size_of::<imageref_core::ImageHeader>();
        let mut header_bytes = vec![0u8; header_len];
        std::io::Read::read_exact(&mut cursor, &mut header_bytes).expect("header");
        let header = {
            use zerocopy::FromBytes;
            imageref_core::ImageHeader::read_from(&header_bytes[..]).expect("header")
        };
        let mut buffer = vec![0u8; header.payload_size as usize];
        clump::load_clump(
            &SCENE_GRAPH_TYPE,
            &mut cursor,
            header.payload_size,
            &mut buffer,
            &*crate::registry::REGISTRY,
        )
        .expect("load_clump");
        let loaded_graph = unsafe { &*(buffer.as_ptr() as *const SceneGraph) };
        assert_eq!(loaded_graph.positions.len(), 0);
        assert_eq!(loaded_graph.nodes.len(), 0);
    }
}
