use crate::config::ScriptError;
use crate::script::engine_thread::{JsEngine, ThreadedDriver};
use crate::script::natives::{is_in_net, PacNatives};
use crate::script::PAC_UTILS;
use rquickjs::{Context, Ctx, Function, Runtime, Value};

pub const QUICKJS_PRIORITY: i32 = 100;
const NAME: &str = "quickjs";

/// One runtime per engine thread; every sandbox is a separate context on it.
pub struct QuickJs {
    runtime: Runtime,
}

pub struct QuickJsSandbox {
    context: Context,
}

impl QuickJs {
    pub fn driver() -> Result<ThreadedDriver, ScriptError> {
        Self::driver_with_priority(QUICKJS_PRIORITY)
    }

    pub fn driver_with_priority(priority: i32) -> Result<ThreadedDriver, ScriptError> {
        ThreadedDriver::spawn(NAME, priority, || {
            let runtime = Runtime::new().map_err(|e| ScriptError::Init(NAME, e.to_string()))?;
            Ok(QuickJs { runtime })
        })
    }
}

fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let value = ctx.catch();
    if let Some(ex) = value.as_exception() {
        format!(
            "{}{}",
            ex.message().unwrap_or_else(|| "MISSING MSG".to_string()),
            ex.line()
                .map_or_else(String::default, |l| format!(" in line {}", l))
        )
    } else if let Some(s) = value.as_string() {
        s.to_string().unwrap_or_default()
    } else {
        format!("thrown {}", value.type_of().as_str())
    }
}

fn install_natives(ctx: &Ctx<'_>, natives: PacNatives) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    let local = natives.clone();
    globals.set(
        "myIpAddress",
        Function::new(ctx.clone(), move || local.my_ip_address())?,
    )?;
    globals.set(
        "__dnsResolve",
        Function::new(ctx.clone(), move |host: String| {
            natives.dns_resolve(&host).unwrap_or_default()
        })?,
    )?;
    globals.set(
        "__isInNet",
        Function::new(ctx.clone(), |ip: String, net: String, mask: String| {
            is_in_net(&ip, &net, &mask)
        })?,
    )?;
    globals.set(
        "alert",
        Function::new(ctx.clone(), |msg: String| {
            tracing::info!("[js:{}]: {}", NAME, msg);
        })?,
    )?;
    Ok(())
}

impl JsEngine for QuickJs {
    type Sandbox = QuickJsSandbox;

    fn create(&mut self, script: &str, natives: PacNatives) -> Result<QuickJsSandbox, ScriptError> {
        let context =
            Context::full(&self.runtime).map_err(|e| ScriptError::Init(NAME, e.to_string()))?;
        context.with(|ctx| -> Result<(), ScriptError> {
            install_natives(&ctx, natives).map_err(|e| ScriptError::Init(NAME, e.to_string()))?;
            ctx.eval::<Value, _>(PAC_UTILS)
                .map_err(|e| ScriptError::Init(NAME, describe(&ctx, e)))?;
            ctx.eval::<Value, _>(script)
                .map_err(|e| ScriptError::Compile(describe(&ctx, e)))?;
            Ok(())
        })?;
        Ok(QuickJsSandbox { context })
    }

    fn execute(
        &mut self,
        sandbox: &mut QuickJsSandbox,
        url: &str,
        host: &str,
    ) -> Result<String, ScriptError> {
        sandbox.context.with(|ctx| {
            let entry: Value = ctx
                .globals()
                .get("FindProxyForURL")
                .map_err(|e| ScriptError::Exception(describe(&ctx, e)))?;
            let Some(func) = entry.as_function() else {
                return Err(ScriptError::MissingEntry);
            };
            let result: Value = func
                .call((url.to_string(), host.to_string()))
                .map_err(|e| ScriptError::Exception(describe(&ctx, e)))?;
            match result.as_string() {
                Some(s) => s
                    .to_string()
                    .map_err(|e| ScriptError::Exception(e.to_string())),
                None => Err(ScriptError::NotAString(
                    result.type_of().as_str().to_string(),
                )),
            }
        })
    }
}
