//! Android window-surface registry, reading the platform's window-manager
//! singleton through JNI field access.
//!
//! The fields involved (`sDefaultWindowManager`, `mViews`) are private
//! platform internals and move between releases; everything here is
//! best-effort and confined to this one adapter. Class resolution happens
//! once per process and is fatal when it fails — the registry is unusable
//! without it.

use std::rc::Rc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use jni::objects::{GlobalRef, JClass, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};
use once_cell::sync::OnceCell;
use tracing::debug;

use uiprobe_core::{NodeHandle, UiNode, WindowSurfaceRegistry};

/// (window-manager class, static singleton field, field signature). The
/// modern layout first, then the pre-JB one.
const WINDOW_MANAGER_CLASSES: &[(&str, &str, &str)] = &[
    (
        "android/view/WindowManagerGlobal",
        "sDefaultWindowManager",
        "Landroid/view/WindowManagerGlobal;",
    ),
    (
        "android/view/WindowManagerImpl",
        "mWindowManager",
        "Landroid/view/WindowManagerImpl;",
    ),
];

struct WindowManagerBinding {
    class: GlobalRef,
    instance_field: &'static str,
    instance_sig: &'static str,
}

static WINDOW_MANAGER: OnceCell<WindowManagerBinding> = OnceCell::new();

/// Surface registry backed by the platform window manager.
pub struct AndroidSurfaceRegistry {
    vm: Arc<JavaVM>,
}

impl AndroidSurfaceRegistry {
    /// Resolve the window-manager class (once per process) and build the
    /// registry. An `Err` here means the platform layout is unknown and the
    /// whole component is unusable; abort initialization.
    pub fn new(vm: JavaVM) -> Result<Self> {
        let vm = Arc::new(vm);
        WINDOW_MANAGER.get_or_try_init(|| -> Result<WindowManagerBinding> {
            let mut env = vm
                .attach_current_thread()
                .context("attaching to the JVM")?;
            for (class_name, field, sig) in WINDOW_MANAGER_CLASSES {
                match env.find_class(class_name) {
                    Ok(class) => {
                        let global = env.new_global_ref(&class)?;
                        debug!(class = class_name, "resolved window manager class");
                        return Ok(WindowManagerBinding {
                            class: global,
                            instance_field: field,
                            instance_sig: sig,
                        });
                    }
                    Err(_) => {
                        let _ = env.exception_clear();
                    }
                }
            }
            bail!("no known window manager class could be resolved")
        })?;
        Ok(Self { vm })
    }
}

impl WindowSurfaceRegistry for AndroidSurfaceRegistry {
    fn window_decor_views(&self) -> Result<Vec<NodeHandle>> {
        let binding = WINDOW_MANAGER
            .get()
            .context("window manager class was never resolved")?;
        let mut env = self
            .vm
            .attach_current_thread()
            .context("attaching to the JVM")?;
        let result = read_decor_views(&mut env, binding, &self.vm);
        if result.is_err() {
            let _ = env.exception_clear();
        }
        result
    }
}

/// Read `<class>.<instance_field>.mViews` and wrap each element.
fn read_decor_views(
    env: &mut JNIEnv,
    binding: &WindowManagerBinding,
    vm: &Arc<JavaVM>,
) -> Result<Vec<NodeHandle>> {
    let class = JClass::from(env.new_local_ref(binding.class.as_obj())?);
    let instance = env
        .get_static_field(&class, binding.instance_field, binding.instance_sig)
        .context("reading the window manager singleton")?
        .l()?;
    if instance.is_null() {
        bail!("window manager singleton is not initialized");
    }

    // Modern platforms keep the decor views in an ArrayList; the legacy
    // manager used a plain View[].
    let mut surfaces = Vec::new();
    match env.get_field(&instance, "mViews", "Ljava/util/ArrayList;") {
        Ok(value) => {
            let views = value.l()?;
            if views.is_null() {
                bail!("displayed-surfaces list is null");
            }
            let size = env.call_method(&views, "size", "()I", &[])?.i()?;
            for i in 0..size {
                let element = env
                    .call_method(&views, "get", "(I)Ljava/lang/Object;", &[JValue::Int(i)])?
                    .l()?;
                if element.is_null() {
                    continue;
                }
                let node = AndroidViewNode::wrap(env, Arc::clone(vm), &element)?;
                surfaces.push(Rc::new(node) as NodeHandle);
            }
        }
        Err(_) => {
            let _ = env.exception_clear();
            let value = env
                .get_field(&instance, "mViews", "[Landroid/view/View;")
                .context("reading the displayed-surfaces array")?
                .l()?;
            if value.is_null() {
                bail!("displayed-surfaces array is null");
            }
            let array = JObjectArray::from(value);
            let length = env.get_array_length(&array)?;
            for i in 0..length {
                let element = env.get_object_array_element(&array, i)?;
                if element.is_null() {
                    continue;
                }
                let node = AndroidViewNode::wrap(env, Arc::clone(vm), &element)?;
                surfaces.push(Rc::new(node) as NodeHandle);
            }
        }
    }
    Ok(surfaces)
}

/// A `UiNode` over a live platform view. Identity and type name are captured
/// at wrap time; structural reads go back through JNI on every call and
/// degrade to the empty answer when the platform refuses them.
pub struct AndroidViewNode {
    vm: Arc<JavaVM>,
    obj: GlobalRef,
    id: u64,
    type_name: String,
}

impl AndroidViewNode {
    fn wrap(env: &mut JNIEnv, vm: Arc<JavaVM>, obj: &JObject) -> Result<Self> {
        let id = env
            .call_static_method(
                "java/lang/System",
                "identityHashCode",
                "(Ljava/lang/Object;)I",
                &[JValue::Object(obj)],
            )?
            .i()? as u32 as u64;
        let class = env.call_method(obj, "getClass", "()Ljava/lang/Class;", &[])?.l()?;
        let name = env
            .call_method(&class, "getName", "()Ljava/lang/String;", &[])?
            .l()?;
        let type_name = env.get_string(&JString::from(name))?.into();
        let obj = env.new_global_ref(obj)?;
        Ok(Self {
            vm,
            obj,
            id,
            type_name,
        })
    }

    /// Attach and run one JNI interaction; failures clear the pending
    /// exception and collapse to `None`.
    fn with_env<T>(&self, f: impl FnOnce(&mut JNIEnv) -> jni::errors::Result<T>) -> Option<T> {
        let mut env = match self.vm.attach_current_thread() {
            Ok(env) => env,
            Err(e) => {
                debug!("jvm attach failed: {e}");
                return None;
            }
        };
        match f(&mut env) {
            Ok(value) => Some(value),
            Err(e) => {
                let _ = env.exception_clear();
                debug!(node = %self.type_name, "jni call failed: {e}");
                None
            }
        }
    }

    fn instance_of(&self, class_name: &str) -> bool {
        self.with_env(|env| {
            let class = env.find_class(class_name)?;
            env.is_instance_of(self.obj.as_obj(), &class)
        })
        .unwrap_or(false)
    }
}

impl UiNode for AndroidViewNode {
    fn id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn is_instance_of(&self, type_name: &str) -> bool {
        self.instance_of(&type_name.replace('.', "/"))
    }

    fn parent(&self) -> Option<NodeHandle> {
        self.with_env(|env| {
            let parent = env
                .call_method(
                    self.obj.as_obj(),
                    "getParent",
                    "()Landroid/view/ViewParent;",
                    &[],
                )?
                .l()?;
            if parent.is_null() {
                return Ok(None);
            }
            // The parent of a decor view is a ViewRootImpl, not a View; wrap
            // it anyway so the sentinel check upstream can see its type name.
            let node = AndroidViewNode::wrap(env, Arc::clone(&self.vm), &parent)
                .map_err(|_| jni::errors::Error::JavaException)?;
            Ok(Some(Rc::new(node) as NodeHandle))
        })
        .flatten()
    }

    fn child_count(&self) -> usize {
        if !self.instance_of("android/view/ViewGroup") {
            return 0;
        }
        self.with_env(|env| {
            env.call_method(self.obj.as_obj(), "getChildCount", "()I", &[])?
                .i()
        })
        .map(|n| n.max(0) as usize)
        .unwrap_or(0)
    }

    fn children(&self) -> Vec<NodeHandle> {
        let count = self.child_count();
        let mut children = Vec::with_capacity(count);
        for i in 0..count {
            let child = self.with_env(|env| {
                let child = env
                    .call_method(
                        self.obj.as_obj(),
                        "getChildAt",
                        "(I)Landroid/view/View;",
                        &[JValue::Int(i as i32)],
                    )?
                    .l()?;
                if child.is_null() {
                    return Ok(None);
                }
                let node = AndroidViewNode::wrap(env, Arc::clone(&self.vm), &child)
                    .map_err(|_| jni::errors::Error::JavaException)?;
                Ok(Some(Rc::new(node) as NodeHandle))
            });
            if let Some(Some(child)) = child {
                children.push(child);
            }
        }
        children
    }

    fn is_text_display(&self) -> bool {
        self.instance_of("android/widget/TextView")
    }

    fn text(&self) -> Option<String> {
        if !self.is_text_display() {
            return None;
        }
        self.with_env(|env| {
            let text = env
                .call_method(
                    self.obj.as_obj(),
                    "getText",
                    "()Ljava/lang/CharSequence;",
                    &[],
                )?
                .l()?;
            if text.is_null() {
                return Ok(None);
            }
            let string = env
                .call_method(&text, "toString", "()Ljava/lang/String;", &[])?
                .l()?;
            let value: String = env.get_string(&JString::from(string))?.into();
            Ok(Some(value))
        })
        .flatten()
    }

    fn is_list_container(&self) -> bool {
        self.instance_of("android/widget/ListView")
    }
}
