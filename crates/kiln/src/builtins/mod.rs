//! Native function modules installed into every heap.
//!
//! Each module is an instance of the sentinel class whose fields are native function
//! objects. The instances are roots, so natives and their names live as long as the
//! heap.

mod array;
mod string;
mod system;

use crate::{
    heap::{Heap, HeapId},
    object::ObjType,
    resource::HeapResult,
    types::NativeFn,
    value::Value,
};

/// The builtin native modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinModule {
    Array,
    String,
    System,
}

impl BuiltinModule {
    pub const ALL: [Self; 3] = [Self::Array, Self::String, Self::System];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    fn natives(self) -> &'static [(&'static str, NativeFn)] {
        match self {
            Self::Array => array::NATIVES,
            Self::String => string::NATIVES,
            Self::System => system::NATIVES,
        }
    }
}

/// Registers every native of every module in its module instance.
pub(crate) fn install(heap: &mut Heap) -> HeapResult<()> {
    for module in BuiltinModule::ALL {
        let instance = heap.builtin(module);
        for &(name, function) in module.natives() {
            let name = heap.intern_str(name)?;
            let native = heap.new_native(function)?;
            heap.set_field(instance, name, Value::Obj(native))?;
        }
        log::debug!("installed {} natives in module {}", module.natives().len(), module.name());
    }
    Ok(())
}

impl Heap {
    /// Looks up native `name` in `module`.
    #[must_use]
    pub fn builtin_native(&self, module: BuiltinModule, name: &str) -> Option<HeapId> {
        let key = self.find_string(name.as_bytes())?;
        self.get_field(self.builtin(module), key)?.as_obj()
    }
}

/// Returns the array id if `value` is an array.
fn as_array(heap: &Heap, value: Option<&Value>) -> Option<HeapId> {
    as_type(heap, value, ObjType::Array)
}

/// Returns the string id if `value` is a string.
fn as_string(heap: &Heap, value: Option<&Value>) -> Option<HeapId> {
    as_type(heap, value, ObjType::String)
}

fn as_type(heap: &Heap, value: Option<&Value>, kind: ObjType) -> Option<HeapId> {
    value
        .and_then(|value| value.as_obj())
        .filter(|&id| heap.obj_type(id) == kind)
}
