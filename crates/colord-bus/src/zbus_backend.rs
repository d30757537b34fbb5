//! zbus 系统总线后端
//!
//! 真实守护进程连接。调用模型：
//! - 专用调用线程串行执行远程调用（保持每次调用的回复配对）
//! - 调用方阻塞在回复通道上，`select!` 同时监听回复 / 取消令牌 / 超时
//! - 专用信号线程把代理上的全部信号转成 [`SignalFrame`] 投入通道
//!
//! 取消令牌触发后调用方立即返回 `Cancelled`；在途的 zbus 调用由调用
//! 线程继续收尾，其迟到的回复被丢弃。
//!
//! 传输在 Drop 时恰好释放一次：关闭请求通道让调用线程退出，
//! 再关闭底层连接让信号迭代器结束，两个线程都被 join。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use tracing::{debug, warn};
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::{BusConfig, BusError, BusTransport, BusValue, CancelToken, SignalFrame};

/// 调用线程处理的请求
enum Request {
    Call {
        method: String,
        args: Vec<BusValue>,
        reply: Sender<Result<Vec<BusValue>, BusError>>,
    },
    GetAll {
        object_path: String,
        interface: String,
        reply: Sender<Result<HashMap<String, BusValue>, BusError>>,
    },
}

/// zbus 传输
///
/// Drop 时关闭请求通道让调用线程退出，再关闭连接让信号迭代器结束，
/// 两个线程都被 join，不泄漏线程也不延长连接寿命。
pub struct ZbusTransport {
    config: BusConfig,
    /// 底层连接（Drop 时显式关闭）
    conn: Option<Connection>,
    /// 根对象代理（调用方线程直接用于属性读取）
    root_proxy: Proxy<'static>,
    req_tx: Option<Sender<Request>>,
    signal_rx: Receiver<SignalFrame>,
    is_running: Arc<AtomicBool>,
    call_thread: Option<JoinHandle<()>>,
    signal_thread: Option<JoinHandle<()>>,
}

impl ZbusTransport {
    /// 连接系统总线上的 colord 守护进程
    ///
    /// # Errors
    ///
    /// 总线不可达或服务名无效时返回 [`BusError::Connection`]。
    pub fn system(config: BusConfig) -> Result<Self, BusError> {
        let conn =
            Connection::system().map_err(|e| BusError::Connection(e.to_string()))?;
        Self::with_connection(conn, config)
    }

    /// 在已有连接上建立传输（会话总线、测试用私有总线）
    pub fn with_connection(conn: Connection, config: BusConfig) -> Result<Self, BusError> {
        let root_proxy = Proxy::new(
            &conn,
            config.service.clone(),
            config.path.clone(),
            config.interface.clone(),
        )
        .map_err(|e| BusError::Connection(e.to_string()))?;

        let (req_tx, req_rx) = unbounded::<Request>();
        let (signal_tx, signal_rx) = unbounded::<SignalFrame>();
        let is_running = Arc::new(AtomicBool::new(true));

        // 调用线程：串行执行远程调用
        let call_proxy = root_proxy.clone();
        let call_conn = conn.clone();
        let service = config.service.clone();
        let call_thread = std::thread::Builder::new()
            .name("colord-bus-call".to_string())
            .spawn(move || call_loop(&call_proxy, &call_conn, &service, &req_rx))
            .map_err(|e| BusError::Connection(e.to_string()))?;

        // 信号线程：总线信号 → SignalFrame
        let signal_proxy = root_proxy.clone();
        let signal_running = is_running.clone();
        let signal_thread = std::thread::Builder::new()
            .name("colord-bus-signal".to_string())
            .spawn(move || signal_loop(&signal_proxy, &signal_tx, &signal_running))
            .map_err(|e| BusError::Connection(e.to_string()))?;

        Ok(Self {
            config,
            conn: Some(conn),
            root_proxy,
            req_tx: Some(req_tx),
            signal_rx,
            is_running,
            call_thread: Some(call_thread),
            signal_thread: Some(signal_thread),
        })
    }

    fn submit<T: Send + 'static>(
        &self,
        build: impl FnOnce(Sender<Result<T, BusError>>) -> Request,
        cancel: &CancelToken,
    ) -> Result<T, BusError> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        let (reply_tx, reply_rx) = bounded(1);
        let req = build(reply_tx);
        self.req_tx
            .as_ref()
            .ok_or(BusError::Disconnected)?
            .send(req)
            .map_err(|_| BusError::Disconnected)?;

        select! {
            recv(reply_rx) -> result => result.map_err(|_| BusError::Disconnected)?,
            recv(cancel.channel()) -> _ => Err(BusError::Cancelled),
            default(self.config.call_timeout) => Err(BusError::Timeout),
        }
    }
}

impl BusTransport for ZbusTransport {
    fn call(
        &self,
        method: &str,
        args: &[BusValue],
        cancel: &CancelToken,
    ) -> Result<Vec<BusValue>, BusError> {
        let method = method.to_string();
        let args = args.to_vec();
        self.submit(
            move |reply| Request::Call {
                method,
                args,
                reply,
            },
            cancel,
        )
    }

    fn get_all_properties(
        &self,
        object_path: &str,
        interface: &str,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, BusValue>, BusError> {
        let object_path = object_path.to_string();
        let interface = interface.to_string();
        self.submit(
            move |reply| Request::GetAll {
                object_path,
                interface,
                reply,
            },
            cancel,
        )
    }

    fn root_property(&self, name: &str) -> Result<Option<String>, BusError> {
        // 属性缺失视为未设置，不是错误
        Ok(self.root_proxy.get_property::<String>(name).ok())
    }

    fn signals(&self) -> Receiver<SignalFrame> {
        self.signal_rx.clone()
    }
}

impl Drop for ZbusTransport {
    fn drop(&mut self) {
        // 先关请求通道，调用线程的 recv 返回 Disconnected 后退出
        self.req_tx.take();
        if let Some(handle) = self.call_thread.take() {
            let _ = handle.join();
        }

        // 再关闭连接：信号迭代器随流结束返回 None，信号线程退出
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(conn) = self.conn.take() {
            conn.graceful_shutdown();
        }
        if let Some(handle) = self.signal_thread.take() {
            let _ = handle.join();
        }
    }
}

/// 调用线程主循环
fn call_loop(
    proxy: &Proxy<'static>,
    conn: &Connection,
    service: &str,
    req_rx: &Receiver<Request>,
) {
    while let Ok(req) = req_rx.recv() {
        match req {
            Request::Call {
                method,
                args,
                reply,
            } => {
                // 迟到的回复没人收是正常的（调用方已取消/超时）
                let _ = reply.send(perform_call(proxy, &method, &args));
            }
            Request::GetAll {
                object_path,
                interface,
                reply,
            } => {
                let _ = reply.send(perform_get_all(conn, service, &object_path, &interface));
            }
        }
    }
}

/// 执行一次方法调用并做强类型回复解码
fn perform_call(
    proxy: &Proxy<'static>,
    method: &str,
    args: &[BusValue],
) -> Result<Vec<BusValue>, BusError> {
    debug!(method, "issuing call");
    let result = match args {
        [] => proxy.call_method(method, &()),
        [BusValue::Str(a)] => proxy.call_method(method, &(a.as_str(),)),
        [BusValue::Str(a), BusValue::U32(b)] => proxy.call_method(method, &(a.as_str(), *b)),
        _ => {
            return Err(BusError::Decode(format!(
                "unsupported argument shape for {method}"
            )));
        }
    };
    let msg = result.map_err(|e| call_error(method, &e))?;
    decode_reply(method, &msg)
}

/// 对任意对象路径执行 `org.freedesktop.DBus.Properties.GetAll`
fn perform_get_all(
    conn: &Connection,
    service: &str,
    object_path: &str,
    interface: &str,
) -> Result<HashMap<String, BusValue>, BusError> {
    let proxy = Proxy::new(
        conn,
        service.to_string(),
        object_path.to_string(),
        "org.freedesktop.DBus.Properties",
    )
    .map_err(|e| BusError::Call {
        method: "GetAll".to_string(),
        message: e.to_string(),
    })?;

    let msg = proxy
        .call_method("GetAll", &(interface,))
        .map_err(|e| call_error("GetAll", &e))?;
    let (raw,): (HashMap<String, OwnedValue>,) = msg
        .body()
        .deserialize()
        .map_err(|e| BusError::Decode(e.to_string()))?;

    let mut properties = HashMap::with_capacity(raw.len());
    for (name, value) in &raw {
        match bus_value_from(value) {
            Ok(v) => {
                properties.insert(name.clone(), v);
            }
            // 客户端契约之外的属性类型（时间戳数组等）直接跳过
            Err(_) => debug!(property = name.as_str(), "skipping unsupported property type"),
        }
    }
    Ok(properties)
}

/// 按回复体签名做强类型解码
///
/// colord 客户端契约只有四种回复形状：空、单对象路径、路径数组、
/// 字符串。其余签名一律按解码错误处理，不猜测。
fn decode_reply(method: &str, msg: &zbus::message::Message) -> Result<Vec<BusValue>, BusError> {
    let body = msg.body();
    let signature = body.signature().to_string();
    match signature.as_str() {
        "" | "()" => Ok(Vec::new()),
        "o" => {
            let (path,): (OwnedObjectPath,) = body
                .deserialize()
                .map_err(|e| BusError::Decode(e.to_string()))?;
            Ok(vec![BusValue::ObjectPath(path.to_string())])
        }
        "ao" => {
            let (paths,): (Vec<OwnedObjectPath>,) = body
                .deserialize()
                .map_err(|e| BusError::Decode(e.to_string()))?;
            Ok(vec![BusValue::Array(
                paths
                    .into_iter()
                    .map(|p| BusValue::ObjectPath(p.to_string()))
                    .collect(),
            )])
        }
        "s" => {
            let (s,): (String,) = body
                .deserialize()
                .map_err(|e| BusError::Decode(e.to_string()))?;
            Ok(vec![BusValue::Str(s)])
        }
        other => Err(BusError::Decode(format!(
            "unsupported reply signature '{other}' for {method}"
        ))),
    }
}

fn call_error(method: &str, err: &zbus::Error) -> BusError {
    match err {
        zbus::Error::MethodError(name, description, _) => BusError::Call {
            method: method.to_string(),
            message: format!(
                "{}: {}",
                name.as_str(),
                description.as_deref().unwrap_or("unknown error")
            ),
        },
        other => BusError::Call {
            method: method.to_string(),
            message: other.to_string(),
        },
    }
}

/// 信号线程主循环
///
/// 迭代器在连接关闭后返回 None，循环随之结束；running 标志兜底，
/// 保证关闭期间到达的信号不再投递。
fn signal_loop(proxy: &Proxy<'static>, signal_tx: &Sender<SignalFrame>, running: &AtomicBool) {
    let stream = match proxy.receive_all_signals() {
        Ok(stream) => stream,
        Err(e) => {
            warn!("failed to subscribe to signals: {e}");
            return;
        }
    };

    for msg in stream {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let header = msg.header();
        let Some(member) = header.member() else {
            continue;
        };
        let name = member.to_string();
        let args = decode_signal_args(&msg);
        debug!(signal = name.as_str(), "signal frame received");
        if signal_tx.send(SignalFrame { name, args }).is_err() {
            // 所有接收端已消失，传输正在关闭
            break;
        }
    }
}

/// 解码信号参数；契约内的信号只有空载荷或单对象路径
fn decode_signal_args(msg: &zbus::message::Message) -> Vec<BusValue> {
    let body = msg.body();
    match body.signature().to_string().as_str() {
        "o" => body
            .deserialize::<(OwnedObjectPath,)>()
            .map(|(p,)| vec![BusValue::ObjectPath(p.to_string())])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// zvariant 值 → [`BusValue`]
fn bus_value_from(value: &Value<'_>) -> Result<BusValue, BusError> {
    match value {
        Value::Str(s) => Ok(BusValue::Str(s.to_string())),
        Value::ObjectPath(p) => Ok(BusValue::ObjectPath(p.to_string())),
        Value::Bool(b) => Ok(BusValue::Bool(*b)),
        Value::U32(n) => Ok(BusValue::U32(*n)),
        Value::U64(n) => Ok(BusValue::U64(*n)),
        Value::Value(inner) => bus_value_from(inner),
        Value::Array(items) => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items.iter() {
                converted.push(bus_value_from(item)?);
            }
            Ok(BusValue::Array(converted))
        }
        _ => Err(BusError::Decode("unsupported value type".to_string())),
    }
}
