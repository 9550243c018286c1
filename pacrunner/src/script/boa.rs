use crate::config::ScriptError;
use crate::script::engine_thread::{JsEngine, ThreadedDriver};
use crate::script::natives::{is_in_net, PacNatives, FALLBACK_ADDRESS};
use crate::script::PAC_UTILS;
use boa_engine::{js_string, Context, JsResult, JsValue, NativeFunction, Source};
use std::cell::RefCell;

pub const BOA_PRIORITY: i32 = 50;
const NAME: &str = "boa";

thread_local! {
    // Natives of the sandbox currently running on this engine thread.
    static ACTIVE_NATIVES: RefCell<Option<PacNatives>> = const { RefCell::new(None) };
}

pub struct Boa;

pub struct BoaSandbox {
    context: Context,
    natives: PacNatives,
}

impl Boa {
    pub fn driver() -> Result<ThreadedDriver, ScriptError> {
        Self::driver_with_priority(BOA_PRIORITY)
    }

    pub fn driver_with_priority(priority: i32) -> Result<ThreadedDriver, ScriptError> {
        ThreadedDriver::spawn(NAME, priority, || Ok(Boa))
    }
}

fn with_natives<R>(natives: &PacNatives, f: impl FnOnce() -> R) -> R {
    ACTIVE_NATIVES.with(|slot| *slot.borrow_mut() = Some(natives.clone()));
    let result = f();
    ACTIVE_NATIVES.with(|slot| *slot.borrow_mut() = None);
    result
}

fn string_arg(args: &[JsValue], idx: usize) -> String {
    args.get(idx)
        .and_then(|v| v.as_string())
        .and_then(|s| s.to_std_string().ok())
        .unwrap_or_default()
}

fn my_ip_address(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let ip = ACTIVE_NATIVES
        .with(|slot| slot.borrow().as_ref().map(|n| n.my_ip_address()))
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string());
    Ok(js_string!(ip).into())
}

fn dns_resolve(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0);
    let ip = ACTIVE_NATIVES
        .with(|slot| slot.borrow().as_ref().and_then(|n| n.dns_resolve(&host)))
        .unwrap_or_default();
    Ok(js_string!(ip).into())
}

fn in_net(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(is_in_net(
        &string_arg(args, 0),
        &string_arg(args, 1),
        &string_arg(args, 2),
    )
    .into())
}

fn alert(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    tracing::info!("[js:{}]: {}", NAME, string_arg(args, 0));
    Ok(JsValue::undefined())
}

fn register_natives(context: &mut Context) -> JsResult<()> {
    context.register_global_callable(
        js_string!("myIpAddress"),
        0,
        NativeFunction::from_fn_ptr(my_ip_address),
    )?;
    context.register_global_callable(
        js_string!("__dnsResolve"),
        1,
        NativeFunction::from_fn_ptr(dns_resolve),
    )?;
    context.register_global_callable(
        js_string!("__isInNet"),
        3,
        NativeFunction::from_fn_ptr(in_net),
    )?;
    context.register_global_callable(js_string!("alert"), 1, NativeFunction::from_fn_ptr(alert))?;
    Ok(())
}

fn call_entry(context: &mut Context, url: &str, host: &str) -> Result<String, ScriptError> {
    let global = context.global_object();
    let entry = global
        .get(js_string!("FindProxyForURL"), context)
        .map_err(|e| ScriptError::Exception(e.to_string()))?;
    let func = entry.as_callable().ok_or(ScriptError::MissingEntry)?;
    let args = [
        JsValue::from(js_string!(url)),
        JsValue::from(js_string!(host)),
    ];
    let result = func
        .call(&JsValue::undefined(), &args, context)
        .map_err(|e| ScriptError::Exception(e.to_string()))?;
    match result.as_string() {
        Some(s) => s
            .to_std_string()
            .map_err(|e| ScriptError::Exception(e.to_string())),
        None => Err(ScriptError::NotAString(result.type_of().to_string())),
    }
}

impl JsEngine for Boa {
    type Sandbox = BoaSandbox;

    fn create(&mut self, script: &str, natives: PacNatives) -> Result<BoaSandbox, ScriptError> {
        let mut context = Context::default();
        register_natives(&mut context).map_err(|e| ScriptError::Init(NAME, e.to_string()))?;
        with_natives(&natives, || -> Result<(), ScriptError> {
            context
                .eval(Source::from_bytes(PAC_UTILS.as_bytes()))
                .map_err(|e| ScriptError::Init(NAME, e.to_string()))?;
            context
                .eval(Source::from_bytes(script.as_bytes()))
                .map_err(|e| ScriptError::Compile(e.to_string()))?;
            Ok(())
        })?;
        Ok(BoaSandbox { context, natives })
    }

    fn execute(
        &mut self,
        sandbox: &mut BoaSandbox,
        url: &str,
        host: &str,
    ) -> Result<String, ScriptError> {
        let BoaSandbox { context, natives } = sandbox;
        with_natives(natives, || call_entry(context, url, host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::natives::tests::StaticResolver;
    use crate::script::ScriptDriver;
    use std::sync::Arc;

    fn natives(local: &str) -> PacNatives {
        PacNatives::new(
            None,
            Arc::new(StaticResolver::with(&[("db.corp", "10.9.8.7")], Some(local))),
        )
    }

    #[test]
    fn test_find_proxy() {
        let driver = Boa::driver().unwrap();
        assert_eq!(driver.name(), "boa");
        let sandbox = driver
            .create_sandbox(
                r#"function FindProxyForURL(url, host) {
                    if (isInNet(host, "10.0.0.0", "255.0.0.0")) return "DIRECT";
                    if (shExpMatch(host, "*.example.org")) return "SOCKS5 gw:1080";
                    return "PROXY " + myIpAddress() + ":3128";
                }"#,
                natives("172.16.0.9"),
            )
            .unwrap();
        assert_eq!(driver.execute(sandbox, "http://db.corp/", "db.corp").unwrap(), "DIRECT");
        assert_eq!(
            driver.execute(sandbox, "http://www.example.org/", "www.example.org").unwrap(),
            "SOCKS5 gw:1080"
        );
        assert_eq!(
            driver.execute(sandbox, "http://other/", "other").unwrap(),
            "PROXY 172.16.0.9:3128"
        );
    }

    #[test]
    fn test_natives_follow_sandbox() {
        let driver = Boa::driver().unwrap();
        let script = "function FindProxyForURL(url, host) { return myIpAddress(); }";
        let a = driver.create_sandbox(script, natives("10.0.0.1")).unwrap();
        let b = driver.create_sandbox(script, natives("10.0.0.2")).unwrap();
        assert_eq!(driver.execute(a, "http://x/", "x").unwrap(), "10.0.0.1");
        assert_eq!(driver.execute(b, "http://x/", "x").unwrap(), "10.0.0.2");
    }

    #[test]
    fn test_script_errors() {
        let driver = Boa::driver().unwrap();
        assert!(matches!(
            driver.create_sandbox("function (", natives("10.0.0.1")),
            Err(ScriptError::Compile(_))
        ));
        let empty = driver.create_sandbox("", natives("10.0.0.1")).unwrap();
        assert_eq!(
            driver.execute(empty, "http://x/", "x"),
            Err(ScriptError::MissingEntry)
        );
        let null = driver
            .create_sandbox(
                "function FindProxyForURL(url, host) { return null; }",
                natives("10.0.0.1"),
            )
            .unwrap();
        assert!(matches!(
            driver.execute(null, "http://x/", "x"),
            Err(ScriptError::NotAString(_))
        ));
    }
}
