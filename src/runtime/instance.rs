// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The module runtime: one instance, its store and the entry points.

use std::path::Path;
use std::rc::Rc;

use serde_json::Value;
use wasmtime::{AsContextMut, Engine, Instance, Linker, Module, Store, WasmParams, WasmResults};

use crate::adapters::{add_to_linker, check_imports};
use crate::bridge::abi::{classify_call_error, optional_func, required_func, ModuleExports, ModuleHost};
use crate::bridge::debug::describe;
use crate::bridge::event_loop::{run_until_idle, settle};
use crate::bridge::handles::take;
use crate::bridge::promise::{self as promises, PromiseRef};
use crate::bridge::strings::encode;
use crate::bridge::{BridgeState, BridgeStats, HostValue};
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::models::SupportedModels;
use crate::net::{Fetcher, ReqwestFetcher};
use crate::observability::messages::module::{EntryPointCalled, ModuleInstantiated, ModuleReinstantiated};
use crate::observability::messages::StructuredLog;
use crate::runtime::detector::ensure_core_module;
use crate::runtime::engine::create_engine;
use crate::runtime::loader::load_module_bytes;

/// Export names tried, in order, for the model listing entry point.
const SUPPORTED_MODELS_EXPORTS: [&str; 2] = ["getSupportedModels", "getSupportedModelSelectors"];

/// A validation module instantiated behind the bridge.
///
/// The runtime is single-threaded: every host value lives in the store and
/// is reference counted without locks, so `ModuleRuntime` is `!Send`.
pub struct ModuleRuntime {
    engine: Engine,
    module: Module,
    linker: Linker<BridgeState>,
    store: Store<BridgeState>,
    instance: Instance,
    config: BridgeConfig,
    fetcher: Rc<dyn Fetcher>,
    module_path: String,
    api_key: Option<String>,
}

impl ModuleRuntime {
    /// Load, compile and instantiate the module at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, config: &BridgeConfig) -> BridgeResult<Self> {
        let path = path.as_ref();
        let bytes = load_module_bytes(path)?;
        let fetcher: Rc<dyn Fetcher> = Rc::new(ReqwestFetcher::new(&config.network)?);
        Self::with_fetcher(&bytes, &path.display().to_string(), config, fetcher)
    }

    pub fn from_bytes(bytes: &[u8], config: &BridgeConfig) -> BridgeResult<Self> {
        let fetcher: Rc<dyn Fetcher> = Rc::new(ReqwestFetcher::new(&config.network)?);
        Self::with_fetcher(bytes, "<memory>", config, fetcher)
    }

    /// Instantiate with a specific network capability.
    pub fn with_fetcher(
        bytes: &[u8],
        module_path: &str,
        config: &BridgeConfig,
        fetcher: Rc<dyn Fetcher>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        ensure_core_module(bytes)?;

        let engine = create_engine()?;
        let module = Module::new(&engine, bytes).map_err(|e| BridgeError::InvalidWasmBinary(format!("{:#}", e)))?;
        check_imports(&module)?;

        let mut linker = Linker::new(&engine);
        add_to_linker(&mut linker)?;

        let (store, instance) = instantiate(&engine, &module, &linker, config, fetcher.clone(), module_path)?;

        Ok(Self {
            engine,
            module,
            linker,
            store,
            instance,
            config: config.clone(),
            fetcher,
            module_path: module_path.to_string(),
            api_key: None,
        })
    }

    /// True while the instance can accept entry point calls.
    pub fn is_ready(&self) -> bool {
        !self.store.data().is_poisoned()
    }

    pub fn poison_reason(&self) -> Option<&str> {
        self.store.data().poison_reason()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> BridgeStats {
        self.store.data().stats()
    }

    /// `configure(api_key)`.
    pub fn configure(&mut self, api_key: &str) -> BridgeResult<()> {
        self.enter("configure")?;
        let key = encode(&mut self.store.as_context_mut(), api_key)?;
        self.call_export::<(i32, i32), ()>("configure", (key.ptr as i32, key.len as i32))?;
        run_until_idle(&mut self.store.as_context_mut())?;
        self.api_key = Some(api_key.to_string());
        Ok(())
    }

    /// `init_panic_hook()`. The module routes panic text through `console.error`.
    pub fn init_panic_hook(&mut self) -> BridgeResult<()> {
        self.enter("init_panic_hook")?;
        self.call_export::<(), ()>("init_panic_hook", ())?;
        self.store.data_mut().panic_hook_installed = true;
        run_until_idle(&mut self.store.as_context_mut())
    }

    /// `validateInput(text, model_selector, input_type)`, returning the promise unsettled.
    pub fn validate_input_promise(
        &mut self,
        text: &str,
        model_selector: i32,
        input_type: &str,
    ) -> BridgeResult<PromiseRef> {
        self.enter("validateInput")?;
        let text = encode(&mut self.store.as_context_mut(), text)?;
        let input_type = encode(&mut self.store.as_context_mut(), input_type)?;

        let handle = self.call_export::<(i32, i32, i32, i32, i32), i32>(
            "validateInput",
            (
                text.ptr as i32,
                text.len as i32,
                model_selector,
                input_type.ptr as i32,
                input_type.len as i32,
            ),
        )?;

        let mut cx = self.store.as_context_mut();
        let promise = match take(&mut cx, handle as u32)? {
            HostValue::Promise(promise) => promise,
            other => promises::promise_resolve(&mut cx, other),
        };
        run_until_idle(&mut cx)?;
        Ok(promise)
    }

    /// Drive the event loop until `promise` settles.
    ///
    /// A rejection becomes [`BridgeError::Rejected`] carrying the rendered reason.
    pub async fn await_promise(&mut self, promise: &PromiseRef) -> BridgeResult<HostValue> {
        let timeout = self.config.network.timeout();
        let outcome = settle(&mut self.store.as_context_mut(), promise, timeout).await?;
        outcome.map_err(|reason| BridgeError::Rejected(describe(&reason)))
    }

    /// `validateInput` awaited and converted to JSON.
    pub async fn validate_input(
        &mut self,
        text: &str,
        model_selector: i32,
        input_type: &str,
    ) -> BridgeResult<Value> {
        let promise = self.validate_input_promise(text, model_selector, input_type)?;
        let value = self.await_promise(&promise).await?;
        json_of(&value)
    }

    /// `getSupportedModels()`.
    pub fn supported_models(&mut self) -> BridgeResult<SupportedModels> {
        let name = SUPPORTED_MODELS_EXPORTS
            .into_iter()
            .find(|name| self.instance.get_func(&mut self.store, name).is_some())
            .ok_or_else(|| BridgeError::MissingExport {
                name: SUPPORTED_MODELS_EXPORTS[0].to_string(),
            })?;

        self.enter(name)?;
        let handle = self.call_export::<(), i32>(name, ())?;
        let mut cx = self.store.as_context_mut();
        let value = take(&mut cx, handle as u32)?;
        run_until_idle(&mut cx)?;
        SupportedModels::from_json(&json_of(&value)?)
    }

    /// Replace the instance with a fresh one from the same compiled module.
    ///
    /// Every handle, closure and pending operation of the old instance is
    /// dropped. The panic hook and the last configured key are applied again.
    pub fn reinstantiate(&mut self) -> BridgeResult<()> {
        let was_poisoned = self.store.data().is_poisoned();
        let panic_hook = self.store.data().panic_hook_installed;

        let (store, instance) = instantiate(
            &self.engine,
            &self.module,
            &self.linker,
            &self.config,
            self.fetcher.clone(),
            &self.module_path,
        )?;
        self.store = store;
        self.instance = instance;

        ModuleReinstantiated {
            module_path: &self.module_path,
            was_poisoned,
        }
        .log();

        if panic_hook {
            self.init_panic_hook()?;
        }
        if let Some(api_key) = self.api_key.clone() {
            self.configure(&api_key)?;
        }
        Ok(())
    }

    fn enter(&mut self, entry_point: &str) -> BridgeResult<()> {
        if self.store.data().is_poisoned() {
            return Err(BridgeError::InstanceUnusable);
        }
        EntryPointCalled {
            entry_point,
            fuel: self.store.data().fuel_per_call,
        }
        .log();
        self.store.as_context_mut().begin_turn();
        Ok(())
    }

    fn call_export<P, R>(&mut self, name: &str, params: P) -> BridgeResult<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = required_func::<P, R>(&self.instance, &mut self.store.as_context_mut(), name)?;
        let result = func.call(&mut self.store, params);
        result.map_err(|e| boundary_error(e, self.store.data_mut()))
    }
}

fn instantiate(
    engine: &Engine,
    module: &Module,
    linker: &Linker<BridgeState>,
    config: &BridgeConfig,
    fetcher: Rc<dyn Fetcher>,
    module_path: &str,
) -> BridgeResult<(Store<BridgeState>, Instance)> {
    let mut store = Store::new(engine, BridgeState::new(config, fetcher));
    let fuel_per_call = store.data().fuel_per_call;
    store
        .set_fuel(fuel_per_call)
        .map_err(|e| BridgeError::EngineError(e.to_string()))?;

    let instance = linker.instantiate(&mut store, module)?;
    let exports = ModuleExports::resolve(&instance, &mut store.as_context_mut())?;
    let realloc = exports.realloc.is_some();
    let module_managed_handles = exports.module_managed_handles();
    store.data_mut().bind(exports);

    ModuleInstantiated {
        module_path,
        realloc,
        module_managed_handles,
        fuel_per_call,
    }
    .log();

    let start = optional_func::<(), ()>(&instance, &mut store.as_context_mut(), "__wbindgen_start")?;
    if let Some(start) = start {
        let result = start.call(&mut store, ());
        result.map_err(|e| boundary_error(e, store.data_mut()))?;
        run_until_idle(&mut store.as_context_mut())?;
    }

    Ok((store, instance))
}

/// Classify an error that crossed an entry point.
///
/// A host exception that escaped the module is reported with its value.
fn boundary_error(error: wasmtime::Error, state: &mut BridgeState) -> BridgeError {
    match classify_call_error(error, state) {
        BridgeError::Thrown => {
            let message = state
                .pending_exception
                .take()
                .map(|value| describe(&value))
                .unwrap_or_else(|| "undefined".to_string());
            BridgeError::HostException(message)
        }
        other => other,
    }
}

fn json_of(value: &HostValue) -> BridgeResult<Value> {
    value
        .to_json()
        .map(|json| json.unwrap_or(Value::Null))
        .map_err(|e| BridgeError::ValidationError(e.to_string()))
}
