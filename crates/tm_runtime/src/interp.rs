//! Tree-walking evaluation of compiled modules.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tm_ast::*;

use crate::builtins;
use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::ops;
use crate::runtime::Runtime;
use crate::value::{Args, Env, Function, FunctionBody, Key, Scope, Value};

/// Calls nested deeper than this raise `RecursionError`.
pub const MAX_CALL_DEPTH: usize = 64;

/// How a statement finished.
pub(crate) enum Flow {
    Next,
    Return(Value),
    Break,
    Continue,
}

type Emit<'a> = dyn FnMut(&mut Runtime, &Env) -> ExecResult<()> + 'a;

impl Runtime {
    pub(crate) fn exec_block(&mut self, body: &[Stmt], env: &Env) -> ExecResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt, env)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> ExecResult<Flow> {
        match stmt {
            Stmt::Expr(s) => {
                self.eval(&s.expr, env)?;
            }
            Stmt::Assign(s) => {
                let value = self.eval(&s.value, env)?;
                for target in &s.targets {
                    self.assign(target, value.clone(), env)?;
                }
            }
            Stmt::AugAssign(s) => {
                let current = self.eval(&s.target, env)?;
                let rhs = self.eval(&s.value, env)?;
                let value = match (&current, s.op) {
                    // `xs += ys` extends in place.
                    (Value::List(items), BinaryOp::Add) => {
                        let extra = ops::iterate(&rhs, s.value.span())?;
                        items.borrow_mut().extend(extra);
                        current.clone()
                    }
                    _ => ops::binary_op(s.op, &current, &rhs, s.span)?,
                };
                self.assign(&s.target, value, env)?;
            }
            Stmt::FunctionDef(s) => {
                let params = self.eval_params(&s.params, env)?;
                let function = Function {
                    name: s.name.sym.clone(),
                    params,
                    body: FunctionBody::Block(s.body.clone().into()),
                    env: env.clone(),
                };
                env.borrow_mut()
                    .set(s.name.sym.clone(), Value::Function(Rc::new(function)));
            }
            Stmt::Return(s) => {
                let value = match &s.value {
                    Some(value) => self.eval(value, env)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If(s) => {
                let branch = if self.eval(&s.test, env)?.truthy() {
                    &s.body
                } else {
                    &s.orelse
                };
                return self.exec_block(branch, env);
            }
            Stmt::While(s) => {
                while self.eval(&s.test, env)?.truthy() {
                    match self.exec_block(&s.body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }
            Stmt::For(s) => {
                let iterable = self.eval(&s.iter, env)?;
                for item in ops::iterate(&iterable, s.iter.span())? {
                    self.assign(&s.target, item, env)?;
                    match self.exec_block(&s.body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }
            Stmt::Import(s) => {
                for alias in &s.names {
                    let module = self.import_module_at(&alias.name, alias.span)?;
                    env.borrow_mut().set(alias.binding(), Value::Module(module));
                }
            }
            Stmt::ImportFrom(s) => {
                let module = self.import_module_at(&s.module, s.span)?;
                for alias in &s.names {
                    let value = module.get(&alias.name).ok_or_else(|| {
                        ExecError::new(
                            ErrorKind::ImportError,
                            format!("cannot import name '{}' from '{}'", alias.name, s.module),
                            alias.span,
                        )
                    })?;
                    env.borrow_mut().set(alias.binding(), value);
                }
            }
            Stmt::Assert(s) => {
                if !self.eval(&s.test, env)?.truthy() {
                    let message = match &s.msg {
                        Some(msg) => self.eval(msg, env)?.to_string(),
                        None => String::new(),
                    };
                    return Err(ExecError::new(ErrorKind::AssertionError, message, s.span));
                }
            }
            Stmt::Pass(_) => {}
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
        }
        Ok(Flow::Next)
    }

    fn eval_params(&mut self, params: &[Param], env: &Env) -> ExecResult<Vec<(String, Option<Value>)>> {
        params
            .iter()
            .map(|param| {
                let default = match &param.default {
                    Some(default) => Some(self.eval(default, env)?),
                    None => None,
                };
                Ok((param.name.sym.clone(), default))
            })
            .collect()
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Env) -> ExecResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, env)).collect()
    }

    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env) -> ExecResult<Value> {
        match expr {
            Expr::Call(e) => {
                let callee = self.eval(&e.func, env)?;
                let positional = self.eval_all(&e.args, env)?;
                let mut keywords = Vec::with_capacity(e.keywords.len());
                for keyword in &e.keywords {
                    keywords.push((keyword.arg.sym.clone(), self.eval(&keyword.value, env)?));
                }
                self.call_value(
                    &callee,
                    Args {
                        positional,
                        keywords,
                        span: e.span,
                    },
                )
            }
            Expr::Unary(e) => {
                let operand = self.eval(&e.operand, env)?;
                ops::unary_op(e.op, &operand, e.span)
            }
            Expr::Bin(e) => {
                let left = self.eval(&e.left, env)?;
                let right = self.eval(&e.right, env)?;
                ops::binary_op(e.op, &left, &right, e.span)
            }
            Expr::Bool(e) => {
                let mut last = Value::None;
                for value in &e.values {
                    last = self.eval(value, env)?;
                    let settled = match e.op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if settled {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Compare(e) => {
                let mut left = self.eval(&e.left, env)?;
                for (op, comparator) in e.ops.iter().zip(&e.comparators) {
                    let right = self.eval(comparator, env)?;
                    if !ops::compare_op(*op, &left, &right, e.span)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfExp(e) => {
                if self.eval(&e.test, env)?.truthy() {
                    self.eval(&e.body, env)
                } else {
                    self.eval(&e.orelse, env)
                }
            }
            Expr::List(e) => Ok(Value::list(self.eval_all(&e.elts, env)?)),
            Expr::Tuple(e) => Ok(Value::tuple(self.eval_all(&e.elts, env)?)),
            Expr::Set(e) => {
                let mut set = IndexSet::new();
                for elt in &e.elts {
                    let value = self.eval(elt, env)?;
                    set.insert(Key::from_value(&value, elt.span())?);
                }
                Ok(Value::Set(Rc::new(RefCell::new(set))))
            }
            Expr::Dict(e) => {
                let mut map = IndexMap::new();
                for entry in &e.entries {
                    let key = self.eval(&entry.key, env)?;
                    let value = self.eval(&entry.value, env)?;
                    map.insert(Key::from_value(&key, entry.key.span())?, value);
                }
                Ok(Value::Dict(Rc::new(RefCell::new(map))))
            }
            Expr::ListComp(e) => {
                let mut items = Vec::new();
                self.comprehension(&e.generators, env, &mut |rt: &mut Runtime, scope: &Env| {
                    items.push(rt.eval(&e.elt, scope)?);
                    Ok(())
                })?;
                Ok(Value::list(items))
            }
            Expr::GeneratorExp(e) => {
                let mut items = Vec::new();
                self.comprehension(&e.generators, env, &mut |rt: &mut Runtime, scope: &Env| {
                    items.push(rt.eval(&e.elt, scope)?);
                    Ok(())
                })?;
                Ok(Value::iterator(items))
            }
            Expr::SetComp(e) => {
                let mut set = IndexSet::new();
                self.comprehension(&e.generators, env, &mut |rt: &mut Runtime, scope: &Env| {
                    let value = rt.eval(&e.elt, scope)?;
                    set.insert(Key::from_value(&value, e.elt.span())?);
                    Ok(())
                })?;
                Ok(Value::Set(Rc::new(RefCell::new(set))))
            }
            Expr::DictComp(e) => {
                let mut map = IndexMap::new();
                self.comprehension(&e.generators, env, &mut |rt: &mut Runtime, scope: &Env| {
                    let key = rt.eval(&e.key, scope)?;
                    let value = rt.eval(&e.value, scope)?;
                    map.insert(Key::from_value(&key, e.key.span())?, value);
                    Ok(())
                })?;
                Ok(Value::Dict(Rc::new(RefCell::new(map))))
            }
            Expr::Subscript(e) => {
                let value = self.eval(&e.value, env)?;
                if let Expr::Slice(slice) = e.index.as_ref() {
                    let lower = self.slice_bound(slice.lower.as_deref(), env)?;
                    let upper = self.slice_bound(slice.upper.as_deref(), env)?;
                    let step = self.slice_bound(slice.step.as_deref(), env)?;
                    return ops::slice_value(&value, lower, upper, step, e.span);
                }
                let index = self.eval(&e.index, env)?;
                ops::index_value(&value, &index, e.span)
            }
            Expr::Slice(e) => Err(ExecError::new(
                ErrorKind::TypeError,
                "slices are only valid inside a subscript",
                e.span,
            )),
            Expr::Attribute(e) => {
                let value = self.eval(&e.value, env)?;
                get_attribute(&value, &e.attr)
            }
            Expr::Lambda(e) => {
                let params = self.eval_params(&e.params, env)?;
                Ok(Value::Function(Rc::new(Function {
                    name: "<lambda>".to_string(),
                    params,
                    body: FunctionBody::Expr(Rc::new(e.body.as_ref().clone())),
                    env: env.clone(),
                })))
            }
            Expr::Name(ident) => Scope::lookup(env, &ident.sym).ok_or_else(|| {
                ExecError::new(
                    ErrorKind::NameError,
                    format!("name '{}' is not defined", ident.sym),
                    ident.span,
                )
            }),
            Expr::Lit(lit) => Ok(match &lit.value {
                LitValue::Int(i) => Value::Int(*i),
                LitValue::Float(f) => Value::Float(*f),
                LitValue::Str(s) => Value::str(s),
                LitValue::Bool(b) => Value::Bool(*b),
                LitValue::None => Value::None,
            }),
            // Only reachable inside subscript indexes.
            Expr::Placeholder(_) => Ok(Value::Ellipsis),
        }
    }

    fn slice_bound(&mut self, bound: Option<&Expr>, env: &Env) -> ExecResult<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval(expr, env)? {
            Value::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                ExecError::new(
                    ErrorKind::TypeError,
                    format!(
                        "slice indices must be integers or None, not {}",
                        value.type_name()
                    ),
                    expr.span(),
                )
            }),
        }
    }

    /// Comprehensions run in their own scope so their targets do not leak.
    fn comprehension(
        &mut self,
        generators: &[Comprehension],
        env: &Env,
        emit: &mut Emit<'_>,
    ) -> ExecResult<()> {
        let scope = Scope::new_env(Some(env.clone()));
        self.generate(generators, &scope, emit)
    }

    fn generate(
        &mut self,
        generators: &[Comprehension],
        scope: &Env,
        emit: &mut Emit<'_>,
    ) -> ExecResult<()> {
        let Some((first, rest)) = generators.split_first() else {
            return emit(self, scope);
        };
        let iterable = self.eval(&first.iter, scope)?;
        'items: for item in ops::iterate(&iterable, first.iter.span())? {
            self.assign(&first.target, item, scope)?;
            for cond in &first.ifs {
                if !self.eval(cond, scope)?.truthy() {
                    continue 'items;
                }
            }
            self.generate(rest, scope, emit)?;
        }
        Ok(())
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &Env) -> ExecResult<()> {
        match target {
            Expr::Name(ident) => {
                env.borrow_mut().set(ident.sym.clone(), value);
                Ok(())
            }
            Expr::Tuple(TupleExpr { elts, span }) | Expr::List(ListExpr { elts, span }) => {
                let items = ops::iterate(&value, *span)?;
                if items.len() != elts.len() {
                    return Err(ExecError::new(
                        ErrorKind::ValueError,
                        format!(
                            "expected {} values to unpack, got {}",
                            elts.len(),
                            items.len()
                        ),
                        *span,
                    ));
                }
                for (elt, item) in elts.iter().zip(items) {
                    self.assign(elt, item, env)?;
                }
                Ok(())
            }
            Expr::Subscript(e) => {
                let container = self.eval(&e.value, env)?;
                let index = self.eval(&e.index, env)?;
                ops::set_item(&container, &index, value, e.span)
            }
            Expr::Attribute(e) => match self.eval(&e.value, env)? {
                Value::Module(module) => {
                    module.globals.borrow_mut().set(e.attr.sym.clone(), value);
                    Ok(())
                }
                other => Err(ExecError::new(
                    ErrorKind::AttributeError,
                    format!(
                        "'{}' object attribute '{}' is read-only",
                        other.type_name(),
                        e.attr
                    ),
                    e.span,
                )),
            },
            other => Err(ExecError::new(
                ErrorKind::TypeError,
                format!("cannot assign to {}", other.kind()),
                other.span(),
            )),
        }
    }

    pub(crate) fn call_value(&mut self, callee: &Value, args: Args) -> ExecResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Builtin(builtin) => (builtin.func)(self, args),
            Value::Method(method) => {
                builtins::call_method(self, &method.receiver, method.name, args)
            }
            other => Err(ExecError::new(
                ErrorKind::TypeError,
                format!("'{}' object is not callable", other.type_name()),
                args.span,
            )),
        }
    }

    fn call_function(&mut self, function: &Function, args: Args) -> ExecResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ExecError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
                args.span,
            ));
        }
        let scope = bind_arguments(function, args)?;
        self.depth += 1;
        let result = match &function.body {
            FunctionBody::Block(body) => self.exec_block(body, &scope).map(|flow| match flow {
                Flow::Return(value) => value,
                Flow::Next | Flow::Break | Flow::Continue => Value::None,
            }),
            FunctionBody::Expr(body) => self.eval(body, &scope),
        };
        self.depth -= 1;
        result
    }
}

fn bind_arguments(function: &Function, args: Args) -> ExecResult<Env> {
    let Args {
        positional,
        keywords,
        span,
    } = args;
    let name = &function.name;
    let type_error = |message: String| ExecError::new(ErrorKind::TypeError, message, span);

    if positional.len() > function.params.len() {
        return Err(type_error(format!(
            "{name}() takes {} positional arguments but {} were given",
            function.params.len(),
            positional.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; function.params.len()];
    for (slot, value) in slots.iter_mut().zip(positional) {
        *slot = Some(value);
    }
    for (keyword, value) in keywords {
        let Some(index) = function.params.iter().position(|(param, _)| *param == keyword) else {
            return Err(type_error(format!(
                "{name}() got an unexpected keyword argument '{keyword}'"
            )));
        };
        if slots[index].is_some() {
            return Err(type_error(format!(
                "{name}() got multiple values for argument '{keyword}'"
            )));
        }
        slots[index] = Some(value);
    }

    let scope = Scope::new_env(Some(function.env.clone()));
    {
        let mut locals = scope.borrow_mut();
        for ((param, default), slot) in function.params.iter().zip(slots) {
            let value = slot.or_else(|| default.clone()).ok_or_else(|| {
                type_error(format!("{name}() missing required argument: '{param}'"))
            })?;
            locals.set(param.clone(), value);
        }
    }
    Ok(scope)
}

fn get_attribute(value: &Value, attr: &Ident) -> ExecResult<Value> {
    if let Value::Module(module) = value {
        return module.get(&attr.sym).ok_or_else(|| {
            ExecError::new(
                ErrorKind::AttributeError,
                format!("module '{}' has no attribute '{}'", module.name, attr),
                attr.span,
            )
        });
    }
    builtins::bind_method(value, &attr.sym).ok_or_else(|| {
        ExecError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{}'", value.type_name(), attr),
            attr.span,
        )
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::import::SourceLoader;

    fn run(source: &str) -> ExecResult<String> {
        let mut rt = Runtime::new();
        let out = rt.capture_output();
        rt.exec_source_with(&SourceLoader, "main", Path::new("main.tm"), source)?;
        let text = out.borrow().clone();
        Ok(text)
    }

    fn run_err(source: &str) -> ExecError {
        match run(source) {
            Ok(out) => panic!("expected an error, got output {out:?}"),
            Err(err) => err,
        }
    }

    #[test]
    fn functions_and_closures() {
        let out = run(
            "def adder(n):\n    def add(x):\n        return x + n\n    return add\n\
             add2 = adder(2)\nprint(add2(3), (lambda a, b=10: a * b)(4))\n",
        )
        .unwrap();
        assert_eq!(out, "5 40\n");
    }

    #[test]
    fn keyword_arguments_bind_by_name() {
        let out = run("def f(a, b=2, c=3):\n    return [a, b, c]\nprint(f(1, c=9))\n").unwrap();
        assert_eq!(out, "[1, 2, 9]\n");

        let err = run_err("def f(a):\n    return a\nf(1, a=2)\n");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "f() got multiple values for argument 'a'");
    }

    #[test]
    fn loops_and_control_flow() {
        let out = run(
            "total = 0\nfor i in range(10):\n    if i % 2 == 0:\n        continue\n    \
             if i > 7:\n        break\n    total += i\nn = 0\nwhile n < 3:\n    n += 1\n\
             print(total, n)\n",
        )
        .unwrap();
        assert_eq!(out, "16 3\n");
    }

    #[test]
    fn comprehensions_have_their_own_scope() {
        let out = run(
            "x = 'outer'\nsquares = [x * x for x in range(4) if x]\n\
             table = {k: v for k, v in zip('ab', [1, 2])}\nprint(squares, table, x)\n",
        )
        .unwrap();
        assert_eq!(out, "[1, 4, 9] {'a': 1, 'b': 2} outer\n");
    }

    #[test]
    fn subscripts_and_slices() {
        let out = run(
            "xs = [1, 2, 3, 4]\nxs[0] = 10\nd = {}\nd['k'] = xs[-1]\n\
             print(xs[1:3], xs[::-1], d, 'hello'[1:])\n",
        )
        .unwrap();
        assert_eq!(out, "[2, 3] [4, 3, 2, 10] {'k': 4} ello\n");
    }

    #[test]
    fn unpacking_assignment() {
        let out = run("a, (b, c) = 1, [2, 3]\nprint(a + b + c)\n").unwrap();
        assert_eq!(out, "6\n");
        let err = run_err("a, b = [1, 2, 3]\n");
        assert_eq!(err.kind, ErrorKind::ValueError);
    }

    #[test]
    fn placeholder_in_index_is_ellipsis() {
        let out = run("d = {}\nd[...] = 'dots'\nprint(d[...])\n").unwrap();
        assert_eq!(out, "dots\n");
    }

    #[test]
    fn methods_of_builtin_types() {
        let out = run(
            "xs = []\nxs.append(3)\nxs.extend([1, 2])\nwords = 'a b c'.split()\n\
             print(sorted(xs), '-'.join(words).upper(), {'k': 1}.get('x', 0))\n",
        )
        .unwrap();
        assert_eq!(out, "[1, 2, 3] A-B-C 0\n");
    }

    #[test]
    fn errors_carry_kind_and_span() {
        let err = run_err("x = 1\ny = undefined + x\n");
        assert_eq!(err.kind, ErrorKind::NameError);
        assert_eq!(err.message, "name 'undefined' is not defined");
        assert!(!err.span.is_dummy());

        let err = run_err("assert 1 == 2, 'mismatch'\n");
        assert_eq!(err.kind, ErrorKind::AssertionError);
        assert_eq!(err.to_string(), "AssertionError: mismatch");
    }

    #[test]
    fn huge_repetition_raises_instead_of_aborting() {
        let err = run_err("x = [1, 2] * 9223372036854775807\n");
        assert_eq!(err.kind, ErrorKind::MemoryError);
        assert!(!err.span.is_dummy());
    }

    #[test]
    fn runaway_recursion_is_an_error() {
        let err = run_err("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(err.kind, ErrorKind::RecursionError);
    }

    #[test]
    fn print_separators() {
        let out = run("print(1, 2, sep=', ', end='!')\nprint()\n").unwrap();
        assert_eq!(out, "1, 2!\n");
    }
}
